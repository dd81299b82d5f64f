//! The Freebox response envelope.
//!
//! Every versioned endpoint answers `{success, result?, error_code?, msg?, uid?}`.
//! [`FreeboxResponse`] is the wire shape, kept intact so the proxy can forward
//! it unchanged; [`Outcome`] is the decoded, tagged view used by code that
//! needs the payload.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Error code used when a successful envelope carries no `result`.
pub const MISSING_RESULT: &str = "missing_result";

/// Error code used when a failed envelope carries no `error_code`.
pub const UNKNOWN_ERROR: &str = "unknown_error";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeboxResponse<T = serde_json::Value> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// Tagged result decoded from an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok { value: T },
    Err { code: String, message: String },
}

impl<T> FreeboxResponse<T> {
    /// A successful envelope carrying `value`.
    pub fn ok(value: T) -> Self {
        Self {
            success: true,
            result: Some(value),
            error_code: None,
            msg: None,
            uid: None,
        }
    }

    /// A failed envelope.
    pub fn failure(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error_code: Some(code.into()),
            msg: Some(msg.into()),
            uid: None,
        }
    }

    /// Human-readable message, falling back to the error code.
    pub fn message(&self) -> String {
        self.msg
            .clone()
            .or_else(|| self.error_code.clone())
            .unwrap_or_else(|| "no message".to_string())
    }

    /// Decode into a tagged outcome. A successful envelope without a result
    /// counts as an error since the caller asked for a payload.
    pub fn into_outcome(self) -> Outcome<T> {
        match (self.success, self.result) {
            (true, Some(value)) => Outcome::Ok { value },
            (true, None) => Outcome::Err {
                code: MISSING_RESULT.to_string(),
                message: "response carried no result".to_string(),
            },
            (false, _) => Outcome::Err {
                message: self
                    .msg
                    .or_else(|| self.error_code.clone())
                    .unwrap_or_else(|| "request failed".to_string()),
                code: self.error_code.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            },
        }
    }
}

impl FreeboxResponse<serde_json::Value> {
    /// Re-type a loosely decoded envelope.
    pub fn decode_result<T: DeserializeOwned>(self) -> serde_json::Result<FreeboxResponse<T>> {
        let result = self.result.map(serde_json::from_value).transpose()?;
        Ok(FreeboxResponse {
            success: self.success,
            result,
            error_code: self.error_code,
            msg: self.msg,
            uid: self.uid,
        })
    }
}

impl<T> Outcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok { value } => Some(value),
            Self::Err { .. } => None,
        }
    }

    pub fn into_result(self) -> Result<T, (String, String)> {
        match self {
            Self::Ok { value } => Ok(value),
            Self::Err { code, message } => Err((code, message)),
        }
    }
}
