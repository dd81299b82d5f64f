use thiserror::Error;

/// Errors seen by a proxy client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The proxy (or the Freebox behind it) refused the request.
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("No session token; log in first")]
    NotAuthenticated,

    #[error("No app token; register the application first")]
    NoAppToken,

    #[error("Authorization still pending after {attempts} attempts")]
    PollExhausted { attempts: u32 },

    #[error("Token persistence error: {0}")]
    Persistence(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
