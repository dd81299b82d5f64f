//! Token persistence.
//!
//! The controller never touches storage directly. It goes through a
//! [`TokenPersistence`] so the same code runs against a file on disk, an
//! in-memory map in tests, or whatever the embedding application provides.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{ClientError, Result};

/// Key holding the long-lived app token.
pub const APP_TOKEN_KEY: &str = "freebox_app_token";

/// Key holding the current session token.
pub const SESSION_TOKEN_KEY: &str = "freebox_session_token";

#[async_trait]
pub trait TokenPersistence: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>>;

    async fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Clearing a missing key is not an error.
    async fn clear(&self, key: &str) -> Result<()>;
}

/// Process-local persistence.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<'a>(values: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            values: Mutex::new(values),
        }
    }
}

#[async_trait]
impl TokenPersistence for MemoryPersistence {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Keeps every key in one JSON object on disk.
#[derive(Debug)]
pub struct FilePersistence {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: tokio::sync::Mutex<()>,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ClientError::persistence(format!("corrupt token file {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(ClientError::persistence(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ClientError::persistence(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let json = serde_json::to_vec_pretty(values)
            .map_err(|e| ClientError::persistence(e.to_string()))?;
        tokio::fs::write(&self.path, json).await.map_err(|e| {
            ClientError::persistence(format!("failed to write {}: {e}", self.path.display()))
        })
    }
}

#[async_trait]
impl TokenPersistence for FilePersistence {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values).await?;
        debug!(key, path = %self.path.display(), "Token saved");
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        if values.remove(key).is_some() {
            self.write_all(&values).await?;
            debug!(key, path = %self.path.display(), "Token cleared");
        }
        Ok(())
    }
}
