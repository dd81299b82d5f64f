use reqwest::StatusCode;
use thiserror::Error;

use crate::response::FreeboxResponse;

#[derive(Debug, Error)]
pub enum FreeboxError {
    /// Transport failure: DNS, connection refused, body read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The version probe answered, but `api_version` had no usable major number.
    #[error("invalid api version: {0:?}")]
    InvalidVersion(String),
    /// Non-2xx answer carrying a Freebox envelope.
    #[error(
        "upstream returned {status}: {}",
        .envelope.msg.as_deref().unwrap_or("no message")
    )]
    Api {
        status: StatusCode,
        envelope: FreeboxResponse<serde_json::Value>,
    },
    /// Non-2xx answer without a decodable envelope.
    #[error("upstream returned {status}")]
    Status { status: StatusCode, body: String },
    /// 2xx answer whose body is not the expected envelope.
    #[error("undecodable {status} response: {message}")]
    Decode { status: StatusCode, message: String },
}

impl FreeboxError {
    /// HTTP status reported by the upstream, if it answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. }
            | Self::Status { status, .. }
            | Self::Decode { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
            _ => None,
        }
    }

    /// Check if this error means the device could not be reached or parsed.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Json(_) | Self::Status { .. } | Self::InvalidVersion(_)
        )
    }
}
