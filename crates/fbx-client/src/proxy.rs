//! Typed calls against the proxy routes.

use bytes::Bytes;
use freebox_api::models::{
    ApiVersion, AppToken, AuthorizationTrack, Download, DownloadConfig, DownloadPatch,
    DownloadStats, DownloadStatus, Session,
};
use freebox_api::{APP_AUTH_HEADER, FreeboxResponse, create_client_builder};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::error::{ClientError, Result};

/// Reply of `GET /api/auth?action=check`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CredentialCheck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub has_token: bool,
    #[serde(default)]
    pub token_data: Option<StoredToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoredToken {
    pub app_token: String,
    pub track_id: u64,
    #[serde(default)]
    pub registered_at: Option<String>,
}

#[derive(Serialize)]
struct CreateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    download_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    download_url_list: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    download_dir: Option<&'a str>,
}

/// HTTP client bound to one proxy.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    base_url: String,
    http: Client,
}

impl ProxyClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = create_client_builder().build()?;
        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: &str, http: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    fn authed(&self, method: Method, path: &str, session_token: &str) -> RequestBuilder {
        self.request(method, path).header(APP_AUTH_HEADER, session_token)
    }

    /// Send and decode the envelope. Unsuccessful envelopes, whether from
    /// the Freebox or synthesized by the proxy, become [`ClientError::Api`].
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<FreeboxResponse<T>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        let envelope: FreeboxResponse<Value> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ClientError::api(
                    format!("http_{}", status.as_u16()),
                    String::from_utf8_lossy(&body).into_owned(),
                ));
            }
            Err(e) => return Err(ClientError::Decode(e.to_string())),
        };

        if !envelope.success {
            debug!(%status, error_code = ?envelope.error_code, "Proxy refused the request");
            let (code, message) = envelope
                .into_outcome()
                .into_result()
                .err()
                .unwrap_or_default();
            return Err(ClientError::Api { code, message });
        }

        envelope
            .decode_result()
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Like [`Self::send`], for calls whose payload is required.
    async fn send_result<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.send::<T>(request)
            .await?
            .into_outcome()
            .into_result()
            .map_err(|(code, message)| ClientError::Api { code, message })
    }

    pub async fn version(&self) -> Result<ApiVersion> {
        let response = self.request(Method::GET, "/api/auth").send().await?;
        let response = response.error_for_status()?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn check(&self) -> Result<CredentialCheck> {
        let response = self
            .request(Method::GET, "/api/auth?action=check")
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    #[instrument(skip(self))]
    pub async fn register(&self) -> Result<AppToken> {
        self.send_result(self.request(Method::POST, "/api/auth?action=register"))
            .await
    }

    pub async fn track(&self, track_id: u64) -> Result<AuthorizationTrack> {
        let path = format!("/api/auth?action=track&track_id={track_id}");
        self.send_result(self.request(Method::GET, &path)).await
    }

    #[instrument(skip_all)]
    pub async fn login(&self, app_token: &str) -> Result<Session> {
        let request = self
            .request(Method::POST, "/api/auth?action=login")
            .json(&json!({ "app_token": app_token }));
        self.send_result(request).await
    }

    #[instrument(skip_all)]
    pub async fn logout(&self, session_token: &str) -> Result<FreeboxResponse<Value>> {
        let request = self
            .request(Method::POST, "/api/auth?action=logout")
            .json(&json!({ "session_token": session_token }));
        self.send(request).await
    }

    pub async fn list_downloads(&self, session_token: &str) -> Result<Vec<Download>> {
        self.send_result(self.authed(Method::GET, "/api/downloads", session_token))
            .await
    }

    pub async fn get_download(&self, session_token: &str, id: u64) -> Result<Download> {
        let path = format!("/api/downloads?id={id}");
        self.send_result(self.authed(Method::GET, &path, session_token))
            .await
    }

    pub async fn download_stats(&self, session_token: &str) -> Result<DownloadStats> {
        self.send_result(self.authed(Method::GET, "/api/downloads/stats", session_token))
            .await
    }

    pub async fn download_config(&self, session_token: &str) -> Result<DownloadConfig> {
        self.send_result(self.authed(Method::GET, "/api/downloads/config", session_token))
            .await
    }

    pub async fn download_log(&self, session_token: &str, id: u64) -> Result<String> {
        let path = format!("/api/downloads/log?id={id}");
        self.send_result(self.authed(Method::GET, &path, session_token))
            .await
    }

    /// Add one URL or magnet link.
    pub async fn add_url(
        &self,
        session_token: &str,
        url: &str,
        download_dir: Option<&str>,
    ) -> Result<FreeboxResponse<Value>> {
        let body = CreateBody {
            download_url: Some(url),
            download_url_list: None,
            download_dir,
        };
        self.send(self.authed(Method::POST, "/api/downloads", session_token).json(&body))
            .await
    }

    /// Add several URLs in one task batch.
    pub async fn add_urls(
        &self,
        session_token: &str,
        urls: &[String],
        download_dir: Option<&str>,
    ) -> Result<FreeboxResponse<Value>> {
        let body = CreateBody {
            download_url: None,
            download_url_list: Some(urls.join("\n")),
            download_dir,
        };
        self.send(self.authed(Method::POST, "/api/downloads", session_token).json(&body))
            .await
    }

    /// Upload a `.torrent` (or `.nzb`) file.
    pub async fn upload_file(
        &self,
        session_token: &str,
        file_name: &str,
        content: Bytes,
        download_dir: Option<&str>,
    ) -> Result<FreeboxResponse<Value>> {
        let part = Part::bytes(content.to_vec()).file_name(file_name.to_string());
        let mut form = Form::new().part("download_file", part);
        if let Some(dir) = download_dir {
            form = form.text("download_dir", dir.to_string());
        }
        let request = self
            .authed(Method::POST, "/api/downloads/upload", session_token)
            .multipart(form);
        self.send(request).await
    }

    pub async fn update_download(
        &self,
        session_token: &str,
        id: u64,
        patch: &DownloadPatch,
    ) -> Result<FreeboxResponse<Value>> {
        let path = format!("/api/downloads?id={id}");
        self.send(self.authed(Method::PUT, &path, session_token).json(patch))
            .await
    }

    pub async fn set_status(
        &self,
        session_token: &str,
        id: u64,
        status: DownloadStatus,
    ) -> Result<FreeboxResponse<Value>> {
        self.update_download(session_token, id, &DownloadPatch::status(status))
            .await
    }

    /// Remove a task. With `erase_files` its files are deleted too.
    pub async fn delete_download(
        &self,
        session_token: &str,
        id: u64,
        erase_files: bool,
    ) -> Result<FreeboxResponse<Value>> {
        let path = if erase_files {
            format!("/api/downloads/erase?id={id}")
        } else {
            format!("/api/downloads?id={id}")
        };
        self.send(self.authed(Method::DELETE, &path, session_token))
            .await
    }
}
