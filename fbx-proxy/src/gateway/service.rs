//! Download gateway.

use freebox_api::models::{DownloadPatch, DownloadStatus};
use freebox_api::{AddDownload, ApiBase, FreeboxClient, FreeboxResponse};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::enrich::{EnrichmentConfig, enrich_errors};
use crate::{Error, Result};

/// Forwards download manager calls on behalf of a session.
#[derive(Debug, Clone)]
pub struct DownloadGateway {
    client: FreeboxClient,
    enrichment: EnrichmentConfig,
}

impl DownloadGateway {
    pub fn new(client: FreeboxClient, enrichment: EnrichmentConfig) -> Self {
        Self { client, enrichment }
    }

    /// Reject a missing or blank session token.
    pub fn require_session(session_token: Option<&str>) -> Result<&str> {
        session_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| Error::unauthorized("session token required"))
    }

    /// Resolve the API root for an authenticated call. Runs the session check
    /// first so that unauthenticated calls never reach the network.
    async fn session<'a>(&self, session_token: Option<&'a str>) -> Result<(ApiBase, &'a str)> {
        let token = Self::require_session(session_token)?;
        let api = self.client.resolve_api().await.map_err(Error::probe_failed)?;
        Ok((api, token))
    }

    /// List all tasks, adding `error_details` to failing ones when the task
    /// log names a tracker failure. Records are otherwise forwarded as sent.
    #[instrument(skip_all)]
    pub async fn list(&self, session_token: Option<&str>) -> Result<FreeboxResponse<Value>> {
        let (api, token) = self.session(session_token).await?;
        let mut response = self.client.list_downloads(&api, token).await?;
        if let Some(Value::Array(downloads)) = response.result.as_mut() {
            enrich_errors(&self.client, &api, token, downloads, &self.enrichment).await;
        }
        Ok(response)
    }

    #[instrument(skip(self, session_token))]
    pub async fn get(
        &self,
        session_token: Option<&str>,
        id: u64,
    ) -> Result<FreeboxResponse<Value>> {
        let (api, token) = self.session(session_token).await?;
        Ok(self.client.get_download(&api, token, id).await?)
    }

    #[instrument(skip_all, fields(encoding = add.encoding()))]
    pub async fn create(
        &self,
        session_token: Option<&str>,
        add: &AddDownload,
    ) -> Result<FreeboxResponse<Value>> {
        let (api, token) = self.session(session_token).await?;
        let response = self.client.add_download(&api, token, add).await?;
        if !response.success {
            warn!(
                error_code = ?response.error_code,
                msg = ?response.msg,
                "Download was not added"
            );
        }
        Ok(response)
    }

    /// Apply a partial update. The patch is forwarded untouched.
    #[instrument(skip(self, session_token, patch))]
    pub async fn update(
        &self,
        session_token: Option<&str>,
        id: u64,
        patch: &Value,
    ) -> Result<FreeboxResponse<Value>> {
        let (api, token) = self.session(session_token).await?;
        Ok(self.client.update_download(&api, token, id, patch).await?)
    }

    async fn set_status(
        &self,
        session_token: Option<&str>,
        id: u64,
        status: DownloadStatus,
    ) -> Result<FreeboxResponse<Value>> {
        let (api, token) = self.session(session_token).await?;
        debug!(id, %status, "Changing download status");
        let patch = DownloadPatch::status(status);
        Ok(self.client.update_download(&api, token, id, &patch).await?)
    }

    pub async fn start(
        &self,
        session_token: Option<&str>,
        id: u64,
    ) -> Result<FreeboxResponse<Value>> {
        self.set_status(session_token, id, DownloadStatus::Downloading).await
    }

    pub async fn stop(
        &self,
        session_token: Option<&str>,
        id: u64,
    ) -> Result<FreeboxResponse<Value>> {
        self.set_status(session_token, id, DownloadStatus::Stopped).await
    }

    /// Same transition as [`Self::start`]: the box does not tell a paused
    /// task from one that never started.
    pub async fn resume(
        &self,
        session_token: Option<&str>,
        id: u64,
    ) -> Result<FreeboxResponse<Value>> {
        self.set_status(session_token, id, DownloadStatus::Downloading).await
    }

    /// Remove a task, keeping its files.
    #[instrument(skip(self, session_token))]
    pub async fn delete(
        &self,
        session_token: Option<&str>,
        id: u64,
    ) -> Result<FreeboxResponse<Value>> {
        let (api, token) = self.session(session_token).await?;
        Ok(self.client.delete_download(&api, token, id).await?)
    }

    /// Remove a task and its files.
    #[instrument(skip(self, session_token))]
    pub async fn erase(
        &self,
        session_token: Option<&str>,
        id: u64,
    ) -> Result<FreeboxResponse<Value>> {
        let (api, token) = self.session(session_token).await?;
        Ok(self.client.erase_download(&api, token, id).await?)
    }

    #[instrument(skip_all)]
    pub async fn stats(&self, session_token: Option<&str>) -> Result<FreeboxResponse<Value>> {
        let (api, token) = self.session(session_token).await?;
        Ok(self.client.download_stats(&api, token).await?)
    }

    #[instrument(skip_all)]
    pub async fn config(&self, session_token: Option<&str>) -> Result<FreeboxResponse<Value>> {
        let (api, token) = self.session(session_token).await?;
        Ok(self.client.download_config(&api, token).await?)
    }

    #[instrument(skip(self, session_token))]
    pub async fn log(
        &self,
        session_token: Option<&str>,
        id: u64,
    ) -> Result<FreeboxResponse<String>> {
        let (api, token) = self.session(session_token).await?;
        Ok(self.client.download_log(&api, token, id).await?)
    }
}
