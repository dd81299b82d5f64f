//! Application-wide error types.

use axum::http::StatusCode;
use freebox_api::{FreeboxError, FreeboxResponse};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::credentials::CredentialError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Version probe or transport failure.
    #[error("Freebox unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Registration rejected ({code}): {message}")]
    RegistrationRejected { code: String, message: String },

    #[error("Login rejected ({code}): {message}")]
    LoginRejected { code: String, message: String },

    #[error("Login challenge unavailable: {0}")]
    ChallengeUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The Freebox answered with a non-2xx status. The envelope is forwarded
    /// as-is.
    #[error("Freebox returned {status}")]
    Upstream {
        status: StatusCode,
        envelope: FreeboxResponse<Value>,
    },

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Any failure of the version probe short-circuits the operation.
    pub fn probe_failed(err: FreeboxError) -> Self {
        Self::UpstreamUnavailable(format!("API version probe failed: {err}"))
    }
}

impl From<FreeboxError> for Error {
    fn from(err: FreeboxError) -> Self {
        match err {
            FreeboxError::Api { status, envelope } => Self::Upstream { status, envelope },
            FreeboxError::Status { status, .. } => Self::Upstream {
                status,
                envelope: FreeboxResponse::failure(
                    "upstream_http_error",
                    format!("Freebox answered HTTP {}", status.as_u16()),
                ),
            },
            FreeboxError::Decode { status, message } => {
                warn!(%status, %message, "Freebox sent an undecodable response");
                Self::Upstream {
                    status: StatusCode::BAD_GATEWAY,
                    envelope: FreeboxResponse::failure(
                        "invalid_upstream_response",
                        "Freebox sent a response that is not a valid envelope",
                    ),
                }
            }
            FreeboxError::InvalidUrl(e) => Self::Configuration(format!("Invalid Freebox URL: {e}")),
            other => Self::UpstreamUnavailable(other.to_string()),
        }
    }
}
