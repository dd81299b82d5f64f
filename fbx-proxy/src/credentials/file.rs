//! File-backed credential store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::error::CredentialError;
use super::store::CredentialStore;
use super::types::AppCredential;

/// Name of the token file inside the data directory.
pub const TOKEN_FILE_NAME: &str = ".freebox-token.json";

/// Stores the credential as pretty-printed JSON.
///
/// Writers are not coordinated: concurrent saves race and the last one wins.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store at `{data_dir}/.freebox-token.json`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(TOKEN_FILE_NAME))
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<AppCredential>, CredentialError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CredentialError::io("reading", &self.path, e)),
        };
        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|source| CredentialError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    async fn save(&self, credential: &AppCredential) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CredentialError::io("creating directory", parent, e))?;
        }
        let content = serde_json::to_vec_pretty(credential)?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| CredentialError::io("writing", &self.path, e))?;
        info!(path = %self.path.display(), track_id = credential.track_id, "Saved app credential");
        Ok(())
    }

    async fn delete(&self) -> Result<(), CredentialError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Deleted app credential");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No app credential to delete");
                Ok(())
            }
            Err(e) => Err(CredentialError::io("deleting", &self.path, e)),
        }
    }

    async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }
}
