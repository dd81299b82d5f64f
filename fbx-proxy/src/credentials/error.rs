//! Credential error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing the stored credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Filesystem failure on the token file.
    #[error("{op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The token file exists but is not a valid credential.
    #[error("Corrupt credential file {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CredentialError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Check if the stored credential must be replaced by registering again.
    pub fn requires_registration(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}
