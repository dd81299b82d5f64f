//! Session controller.
//!
//! Mirrors the proxy's auth state on the client side. The app token and the
//! session token live in a [`SessionContext`] owned by the controller and are
//! written through to a [`TokenPersistence`] so a restart can pick them up.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use freebox_api::FreeboxResponse;
use freebox_api::models::{
    AuthorizationStatus, Download, DownloadConfig, DownloadStats, DownloadStatus, Session,
};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::downloads::build_download_path;
use crate::error::{ClientError, Result};
use crate::persistence::{APP_TOKEN_KEY, SESSION_TOKEN_KEY, TokenPersistence};
use crate::proxy::ProxyClient;

/// Tokens held by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub app_token: Option<String>,
    pub session_token: Option<String>,
}

impl SessionContext {
    pub fn is_authenticated(&self) -> bool {
        self.session_token.is_some()
    }
}

/// How long to wait for the user to answer the prompt on the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 120,
        }
    }
}

pub struct SessionController<P: TokenPersistence + ?Sized = dyn TokenPersistence> {
    proxy: ProxyClient,
    persistence: Arc<P>,
    context: SessionContext,
    /// Base download directory (base64), known after [`Self::fetch_config`].
    download_dir: Option<String>,
}

impl<P: TokenPersistence + ?Sized> SessionController<P> {
    pub fn new(proxy: ProxyClient, persistence: Arc<P>) -> Self {
        Self {
            proxy,
            persistence,
            context: SessionContext::default(),
            download_dir: None,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn proxy(&self) -> &ProxyClient {
        &self.proxy
    }

    pub fn download_dir(&self) -> Option<&str> {
        self.download_dir.as_deref()
    }

    fn session_token(&self) -> Result<&str> {
        self.context
            .session_token
            .as_deref()
            .ok_or(ClientError::NotAuthenticated)
    }

    /// Restore state at startup. Returns whether the proxy holds an app token.
    ///
    /// The proxy is the source of truth: without a credential there, any
    /// locally persisted token is stale and is wiped.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<bool> {
        let check = match self.proxy.check().await {
            Ok(check) => Some(check),
            Err(e) => {
                warn!(error = %e, "Credential check failed");
                None
            }
        };

        let stored = check
            .filter(|c| c.success && c.has_token)
            .and_then(|c| c.token_data)
            .filter(|t| !t.app_token.is_empty());

        let Some(stored) = stored else {
            self.persistence.clear(APP_TOKEN_KEY).await?;
            self.persistence.clear(SESSION_TOKEN_KEY).await?;
            self.context = SessionContext::default();
            debug!("No credential on the proxy, local tokens cleared");
            return Ok(false);
        };

        self.persistence.save(APP_TOKEN_KEY, &stored.app_token).await?;
        self.context.app_token = Some(stored.app_token);
        self.context.session_token = self
            .persistence
            .load(SESSION_TOKEN_KEY)
            .await?
            .filter(|token| !token.is_empty());

        info!(
            restored_session = self.context.is_authenticated(),
            "Credential found on the proxy"
        );
        Ok(true)
    }

    /// Ask the box for a new app token. Returns the id to track.
    #[instrument(skip(self))]
    pub async fn register(&mut self) -> Result<u64> {
        let token = self.proxy.register().await?;
        self.persistence.save(APP_TOKEN_KEY, &token.app_token).await?;
        self.context.app_token = Some(token.app_token);
        Ok(token.track_id)
    }

    pub async fn track(&self, track_id: u64) -> Result<AuthorizationStatus> {
        Ok(self.proxy.track(track_id).await?.status)
    }

    /// Poll until the authorization is granted, denied or timed out.
    #[instrument(skip(self, policy))]
    pub async fn await_authorization(
        &self,
        track_id: u64,
        policy: PollPolicy,
    ) -> Result<AuthorizationStatus> {
        for attempt in 1..=policy.max_attempts {
            let status = self.track(track_id).await?;
            if status.is_terminal() {
                info!(%status, attempt, "Authorization settled");
                return Ok(status);
            }
            debug!(%status, attempt, "Authorization pending");
            if attempt < policy.max_attempts {
                tokio::time::sleep(policy.interval).await;
            }
        }
        Err(ClientError::PollExhausted {
            attempts: policy.max_attempts,
        })
    }

    /// Open a session with the app token from the context.
    #[instrument(skip(self))]
    pub async fn login(&mut self) -> Result<Session> {
        let app_token = self
            .context
            .app_token
            .as_deref()
            .ok_or(ClientError::NoAppToken)?;
        let session = self.proxy.login(app_token).await?;
        self.persistence
            .save(SESSION_TOKEN_KEY, &session.session_token)
            .await?;
        self.context.session_token = Some(session.session_token.clone());
        Ok(session)
    }

    /// Close the session. The session token is dropped locally even when the
    /// proxy call fails; that failure is still returned.
    #[instrument(skip(self))]
    pub async fn logout(&mut self) -> Result<()> {
        let outcome = match self.context.session_token.take() {
            Some(token) => self.proxy.logout(&token).await.map(|_| ()),
            None => Ok(()),
        };
        self.persistence.clear(SESSION_TOKEN_KEY).await?;
        if let Err(e) = &outcome {
            warn!(error = %e, "Logout was not confirmed by the proxy");
        }
        outcome
    }

    pub async fn fetch_downloads(&self) -> Result<Vec<Download>> {
        self.proxy.list_downloads(self.session_token()?).await
    }

    pub async fn fetch_stats(&self) -> Result<DownloadStats> {
        self.proxy.download_stats(self.session_token()?).await
    }

    /// Fetch the download manager configuration and remember its base
    /// directory for [`Self::add_download`] and friends.
    pub async fn fetch_config(&mut self) -> Result<DownloadConfig> {
        let config = self.proxy.download_config(self.session_token()?).await?;
        self.download_dir = config.download_dir.clone();
        Ok(config)
    }

    /// Target directory for a sub path, or `None` for the box default.
    fn target_dir(&self, sub_dir: Option<&str>) -> Option<String> {
        let sub_dir = sub_dir.filter(|s| !s.trim().is_empty())?;
        match self.download_dir.as_deref() {
            Some(base) => build_download_path(base, sub_dir),
            None => {
                warn!("Base download directory unknown, using the default one");
                None
            }
        }
    }

    pub async fn add_download(
        &self,
        url: &str,
        sub_dir: Option<&str>,
    ) -> Result<FreeboxResponse<Value>> {
        let token = self.session_token()?;
        let dir = self.target_dir(sub_dir);
        self.proxy.add_url(token, url, dir.as_deref()).await
    }

    pub async fn add_downloads(
        &self,
        urls: &[String],
        sub_dir: Option<&str>,
    ) -> Result<FreeboxResponse<Value>> {
        let token = self.session_token()?;
        let dir = self.target_dir(sub_dir);
        self.proxy.add_urls(token, urls, dir.as_deref()).await
    }

    pub async fn add_download_file(
        &self,
        file_name: &str,
        content: Bytes,
        sub_dir: Option<&str>,
    ) -> Result<FreeboxResponse<Value>> {
        let token = self.session_token()?;
        let dir = self.target_dir(sub_dir);
        self.proxy
            .upload_file(token, file_name, content, dir.as_deref())
            .await
    }

    pub async fn start_download(&self, id: u64) -> Result<FreeboxResponse<Value>> {
        self.proxy
            .set_status(self.session_token()?, id, DownloadStatus::Downloading)
            .await
    }

    pub async fn stop_download(&self, id: u64) -> Result<FreeboxResponse<Value>> {
        self.proxy
            .set_status(self.session_token()?, id, DownloadStatus::Stopped)
            .await
    }

    /// Same request as [`Self::start_download`].
    pub async fn resume_download(&self, id: u64) -> Result<FreeboxResponse<Value>> {
        self.proxy
            .set_status(self.session_token()?, id, DownloadStatus::Downloading)
            .await
    }

    pub async fn delete_download(
        &self,
        id: u64,
        erase_files: bool,
    ) -> Result<FreeboxResponse<Value>> {
        self.proxy
            .delete_download(self.session_token()?, id, erase_files)
            .await
    }
}
