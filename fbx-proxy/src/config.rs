//! Process configuration, read from the environment (and `.env`).
//!
//! Supported env vars:
//! - `FREEBOX_API_URL` (default `http://mafreebox.freebox.fr`)
//! - `FREEBOX_APP_ID`, `FREEBOX_APP_NAME`, `FREEBOX_APP_VERSION`, `FREEBOX_DEVICE_NAME`
//! - `DATA_DIR` (directory holding `.freebox-token.json`, default: current dir)
//! - `LOG_DIR` (enables daily log files when set)
//! - `ENRICH_CONCURRENCY`, `ENRICH_TIMEOUT_MS`
//! - `API_BIND_ADDRESS`, `API_PORT`, `API_ENABLE_CORS`, `API_BODY_LIMIT`

use std::path::PathBuf;
use std::time::Duration;

use freebox_api::DEFAULT_BASE_URL;
use freebox_api::models::AppIdentity;

use crate::api::server::ApiServerConfig;
use crate::gateway::EnrichmentConfig;

pub const DEFAULT_APP_ID: &str = "freebox.torrent.manager";
pub const DEFAULT_APP_NAME: &str = "Freebox Torrent Manager";
pub const DEFAULT_APP_VERSION: &str = "1.0.0";
pub const DEFAULT_DEVICE_NAME: &str = "Rust Proxy";

/// Where the Freebox lives and how this application introduces itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeboxConfig {
    pub api_url: String,
    pub identity: AppIdentity,
}

impl Default for FreeboxConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            identity: AppIdentity {
                app_id: DEFAULT_APP_ID.to_string(),
                app_name: DEFAULT_APP_NAME.to_string(),
                app_version: DEFAULT_APP_VERSION.to_string(),
                device_name: DEFAULT_DEVICE_NAME.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ApiServerConfig,
    pub freebox: FreeboxConfig,
    pub data_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub enrichment: EnrichmentConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ApiServerConfig::default(),
            freebox: FreeboxConfig::default(),
            data_dir: PathBuf::from("."),
            log_dir: None,
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self {
            server: ApiServerConfig::from_lookup(&var),
            ..Self::default()
        };

        if let Some(url) = var("FREEBOX_API_URL") {
            config.freebox.api_url = url.trim_end_matches('/').to_string();
        }
        let identity = &mut config.freebox.identity;
        if let Some(app_id) = var("FREEBOX_APP_ID") {
            identity.app_id = app_id;
        }
        if let Some(app_name) = var("FREEBOX_APP_NAME") {
            identity.app_name = app_name;
        }
        if let Some(app_version) = var("FREEBOX_APP_VERSION") {
            identity.app_version = app_version;
        }
        if let Some(device_name) = var("FREEBOX_DEVICE_NAME") {
            identity.device_name = device_name;
        }

        if let Some(data_dir) = var("DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        } else if let Ok(cwd) = std::env::current_dir() {
            config.data_dir = cwd;
        }
        config.log_dir = var("LOG_DIR").map(PathBuf::from);

        if let Some(concurrency) = var("ENRICH_CONCURRENCY").and_then(|v| v.parse::<usize>().ok())
            && concurrency > 0
        {
            config.enrichment.concurrency = concurrency;
        }
        if let Some(timeout_ms) = var("ENRICH_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
            config.enrichment.timeout = Duration::from_millis(timeout_ms);
        }

        config
    }
}

/// Parse a boolean env value (`true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`).
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
