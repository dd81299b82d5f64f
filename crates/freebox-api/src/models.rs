//! Wire models for the Freebox API.
//!
//! Records owned by the device keep unknown fields in a flattened `extra` map
//! so they can be forwarded without losing structure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Answer of `GET /api_version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiVersion {
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_model_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Identity sent with an authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub app_id: String,
    pub app_name: String,
    pub app_version: String,
    pub device_name: String,
}

/// Result of `POST /login/authorize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppToken {
    pub app_token: String,
    pub track_id: u64,
}

/// Authorization status as reported by the device while the user validates
/// the request on the box front panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    Pending,
    Timeout,
    Granted,
    Denied,
    #[serde(other)]
    Unknown,
}

impl AuthorizationStatus {
    /// `granted`, `denied` and `timeout` end the authorization; the rest
    /// require polling again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Granted | Self::Denied | Self::Timeout)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Pending => "pending",
            Self::Timeout => "timeout",
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of `GET /login/authorize/{track_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationTrack {
    pub status: AuthorizationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_salt: Option<String>,
}

/// Result of `GET /login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginChallenge {
    #[serde(default)]
    pub logged_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_set: Option<bool>,
}

/// Body of `POST /login/session`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRequest<'a> {
    pub app_id: &'a str,
    pub password: &'a str,
}

/// Result of `POST /login/session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    /// Named permissions granted to the app (settings, downloader, ...).
    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,
}

impl Session {
    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.get(name).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Stopped,
    Queued,
    Starting,
    Downloading,
    Stopping,
    Error,
    Done,
    Checking,
    Repairing,
    Extracting,
    Seeding,
    Retry,
    /// A state this client does not know about yet.
    #[serde(other)]
    Unknown,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Queued => "queued",
            Self::Starting => "starting",
            Self::Downloading => "downloading",
            Self::Stopping => "stopping",
            Self::Error => "error",
            Self::Done => "done",
            Self::Checking => "checking",
            Self::Repairing => "repairing",
            Self::Extracting => "extracting",
            Self::Seeding => "seeding",
            Self::Retry => "retry",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadType {
    Bt,
    Nzb,
    Http,
    Ftp,
    #[serde(other)]
    Unknown,
}

/// Typed view of a download task. `rx_pct` is in hundredths of a percent
/// (10000 = 100%).
///
/// The proxy forwards tasks as raw JSON; this model is for consumers that
/// want typed access and tolerates states and types it does not know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Download {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub status: DownloadStatus,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<DownloadType>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub rx_bytes: u64,
    #[serde(default)]
    pub tx_bytes: u64,
    #[serde(default)]
    pub rx_rate: u64,
    #[serde(default)]
    pub tx_rate: u64,
    #[serde(default)]
    pub rx_pct: u32,
    #[serde(default)]
    pub eta: u64,
    #[serde(default)]
    pub created_ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peers: Option<u32>,
    #[serde(default)]
    pub error: String,
    /// Readable failure reason spliced in from the task log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(default)]
    pub queue_pos: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    #[serde(default)]
    pub stop_ratio: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_password: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadStats {
    #[serde(default)]
    pub nb_tasks: u32,
    #[serde(default)]
    pub nb_tasks_stopped: u32,
    #[serde(default)]
    pub nb_tasks_checking: u32,
    #[serde(default)]
    pub nb_tasks_queued: u32,
    #[serde(default)]
    pub nb_tasks_extracting: u32,
    #[serde(default)]
    pub nb_tasks_done: u32,
    #[serde(default)]
    pub nb_tasks_repairing: u32,
    #[serde(default)]
    pub nb_tasks_seeding: u32,
    #[serde(default)]
    pub nb_tasks_downloading: u32,
    #[serde(default)]
    pub nb_tasks_error: u32,
    #[serde(default)]
    pub nb_tasks_stopping: u32,
    #[serde(default)]
    pub nb_tasks_active: u32,
    #[serde(default)]
    pub rx_rate: u64,
    #[serde(default)]
    pub tx_rate: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Download manager configuration. `download_dir` is base64-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Partial update of a download (`PUT /downloads/{id}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DownloadStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_priority: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DownloadPatch {
    pub fn status(status: DownloadStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_authorization_status_decodes_as_unknown() {
        let track: AuthorizationTrack =
            serde_json::from_value(json!({"status": "something_new"})).unwrap();
        assert_eq!(track.status, AuthorizationStatus::Unknown);
        assert!(!track.status.is_terminal());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(AuthorizationStatus::Granted.is_terminal());
        assert!(AuthorizationStatus::Denied.is_terminal());
        assert!(AuthorizationStatus::Timeout.is_terminal());
        assert!(!AuthorizationStatus::Pending.is_terminal());
    }

    #[test]
    fn test_download_keeps_unknown_fields() {
        let raw = json!({
            "id": 12,
            "name": "debian.iso",
            "status": "seeding",
            "type": "bt",
            "size": 1000,
            "rx_pct": 10000,
            "error": "none",
            "download_dir": "L0Rpc3F1ZSBkdXI=",
            "io_priority": "normal"
        });
        let download: Download = serde_json::from_value(raw).unwrap();
        assert_eq!(download.status, DownloadStatus::Seeding);
        assert_eq!(download.kind, Some(DownloadType::Bt));

        let back = serde_json::to_value(&download).unwrap();
        assert_eq!(back["download_dir"], "L0Rpc3F1ZSBkdXI=");
        assert_eq!(back["io_priority"], "normal");
        assert_eq!(back["type"], "bt");
        assert!(back.get("error_details").is_none());
    }

    #[test]
    fn test_download_tolerates_new_states_and_types() {
        let download: Download = serde_json::from_value(json!({
            "id": 3,
            "status": "paused",
            "type": "magnet"
        }))
        .unwrap();
        assert_eq!(download.status, DownloadStatus::Unknown);
        assert_eq!(download.kind, Some(DownloadType::Unknown));
    }

    #[test]
    fn test_session_permissions() {
        let session: Session = serde_json::from_value(json!({
            "session_token": "tok",
            "challenge": "c",
            "permissions": {"downloader": true, "settings": false, "camera": true}
        }))
        .unwrap();
        assert!(session.has_permission("downloader"));
        assert!(!session.has_permission("settings"));
        assert!(session.has_permission("camera"));
        assert!(!session.has_permission("pvr"));
    }

    #[test]
    fn test_status_patch_serializes_only_status() {
        let patch = DownloadPatch::status(DownloadStatus::Stopped);
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"status": "stopped"}));
    }
}
