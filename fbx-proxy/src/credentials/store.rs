//! Credential persistence abstraction.
//!
//! The auth engine only sees this trait; the file-backed implementation lives
//! in [`super::file`].

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::CredentialError;
use super::types::AppCredential;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the stored credential. A missing record is `Ok(None)`.
    async fn load(&self) -> Result<Option<AppCredential>, CredentialError>;

    /// Replace the stored credential.
    async fn save(&self, credential: &AppCredential) -> Result<(), CredentialError>;

    /// Remove the stored credential. Removing a missing record is not an error.
    async fn delete(&self) -> Result<(), CredentialError>;

    /// Whether a record is present, usable or not.
    async fn exists(&self) -> bool;
}

/// Credential store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<AppCredential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: AppCredential) -> Self {
        Self {
            inner: Mutex::new(Some(credential)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<AppCredential>, CredentialError> {
        Ok(self.inner.lock().clone())
    }

    async fn save(&self, credential: &AppCredential) -> Result<(), CredentialError> {
        *self.inner.lock() = Some(credential.clone());
        Ok(())
    }

    async fn delete(&self) -> Result<(), CredentialError> {
        self.inner.lock().take();
        Ok(())
    }

    async fn exists(&self) -> bool {
        self.inner.lock().is_some()
    }
}
