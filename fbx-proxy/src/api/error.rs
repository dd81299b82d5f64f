//! API error handling.
//!
//! Every failure is rendered as a Freebox-style envelope so that callers only
//! deal with one response shape:
//!
//! ```json
//! {"success": false, "error_code": "unauthorized", "msg": "...", "status": 401}
//! ```
//!
//! Structured errors returned by the Freebox itself are forwarded verbatim,
//! with the status the box used.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use freebox_api::FreeboxResponse;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// Synthetic error envelope.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error_code: String,
    pub msg: String,
    pub status: u16,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    /// Upstream envelope to forward instead of the synthetic one.
    pub envelope: Option<FreeboxResponse<Value>>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            envelope: None,
        }
    }

    /// Forward a Freebox error envelope.
    pub fn upstream(status: StatusCode, envelope: FreeboxResponse<Value>) -> Self {
        Self {
            status,
            code: envelope
                .error_code
                .clone()
                .unwrap_or_else(|| "upstream_error".to_string()),
            message: envelope.message(),
            envelope: Some(envelope),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Some(envelope) = self.envelope {
            return (self.status, Json(envelope)).into_response();
        }
        let body = ApiErrorResponse {
            success: false,
            error_code: self.code,
            msg: self.message,
            status: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::UpstreamUnavailable(msg) => {
                tracing::warn!("Freebox unavailable: {}", msg);
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable", msg)
            }
            Error::Unauthorized(msg) => ApiError::unauthorized(msg),
            Error::RegistrationRejected { code, message }
            | Error::LoginRejected { code, message } => {
                ApiError::new(StatusCode::FORBIDDEN, code, message)
            }
            Error::ChallengeUnavailable(msg) => {
                tracing::error!("Login challenge unavailable: {}", msg);
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "challenge_unavailable",
                    "Could not obtain a login challenge from the Freebox",
                )
            }
            Error::Validation(msg) => ApiError::bad_request(msg),
            Error::Upstream { status, envelope } => ApiError::upstream(status, envelope),
            Error::Credential(e) => {
                tracing::error!("Credential store error: {}", e);
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "credential_store_error",
                    "Credential store error",
                )
            }
            Error::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    "Proxy is misconfigured",
                )
            }
            other => {
                tracing::error!("Unexpected error: {}", other);
                ApiError::internal("An unexpected error occurred")
            }
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_synthetic_envelope() {
        let response =
            ApiError::from(Error::unauthorized("session token required")).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({
                "success": false,
                "error_code": "unauthorized",
                "msg": "session token required",
                "status": 401
            })
        );
    }

    #[tokio::test]
    async fn test_upstream_envelope_forwarded_verbatim() {
        let envelope = FreeboxResponse::failure("auth_required", "Invalid session token");
        let response = ApiError::from(Error::Upstream {
            status: StatusCode::FORBIDDEN,
            envelope,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({
                "success": false,
                "error_code": "auth_required",
                "msg": "Invalid session token"
            })
        );
    }

    #[test]
    fn test_rejections_keep_upstream_code() {
        let err = ApiError::from(Error::LoginRejected {
            code: "invalid_token".to_string(),
            message: "Invalid password".to_string(),
        });
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.code, "invalid_token");
        assert_eq!(err.message, "Invalid password");
    }

    #[test]
    fn test_internal_causes_are_not_leaked() {
        let err = ApiError::from(Error::Io(std::io::Error::other("disk on fire")));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("disk"));
    }
}
