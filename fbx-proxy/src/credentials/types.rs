//! Core credential types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// App token issued by `POST /login/authorize`.
///
/// Immutable once issued; the only way to change it is to register again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCredential {
    pub app_token: String,
    pub track_id: u64,
    pub registered_at: DateTime<Utc>,
}

impl AppCredential {
    /// Create a credential stamped with the current time.
    pub fn new(app_token: impl Into<String>, track_id: u64) -> Self {
        Self {
            app_token: app_token.into(),
            track_id,
            registered_at: Utc::now(),
        }
    }

    /// A record with an empty token or a zero track id counts as absent.
    #[inline]
    pub fn is_usable(&self) -> bool {
        !self.app_token.is_empty() && self.track_id != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_at_serializes_as_rfc3339() {
        let credential: AppCredential = serde_json::from_str(
            r#"{"app_token":"tok","track_id":3,"registered_at":"2024-01-15T10:30:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(credential.registered_at.to_rfc3339(), "2024-01-15T10:30:00+00:00");
        assert!(credential.is_usable());
    }

    #[test]
    fn test_blank_credential_is_not_usable() {
        assert!(!AppCredential::new("", 4).is_usable());
        assert!(!AppCredential::new("tok", 0).is_usable());
    }
}
