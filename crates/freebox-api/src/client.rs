//! HTTP client and versioned base-path resolution.

use reqwest::{Client, ClientBuilder, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use tracing::{debug, instrument, trace};

use crate::models::ApiVersion;
use crate::response::FreeboxResponse;
use crate::{FreeboxError, Result};

/// Header carrying the session token on authenticated calls.
pub const APP_AUTH_HEADER: &str = "X-Fbx-App-Auth";

/// Address of the box on the local network.
pub const DEFAULT_BASE_URL: &str = "http://mafreebox.freebox.fr";

pub(crate) const DEFAULT_UA: &str = concat!("freebox-api/", env!("CARGO_PKG_VERSION"));

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Builder for the shared HTTP client. Timeouts are left at the transport
/// defaults.
pub fn create_client_builder() -> ClientBuilder {
    install_rustls_provider();
    Client::builder().user_agent(DEFAULT_UA)
}

/// Extract the major number of a dotted version string (`"8.4"` -> `8`).
pub fn parse_major_version(version: &str) -> Result<u32> {
    version
        .trim()
        .split('.')
        .next()
        .filter(|major| !major.is_empty())
        .and_then(|major| major.parse::<u32>().ok())
        .ok_or_else(|| FreeboxError::InvalidVersion(version.to_string()))
}

/// Versioned API root, e.g. `http://mafreebox.freebox.fr/api/v8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBase {
    url: String,
    major: u32,
}

impl ApiBase {
    pub fn new(base_url: &str, major: u32) -> Self {
        Self {
            url: format!("{}/api/v{major}", base_url.trim_end_matches('/')),
            major,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }
}

/// Stateless Freebox client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FreeboxClient {
    http: Client,
    base_url: String,
}

impl FreeboxClient {
    pub fn new(base_url: &str, http: Client) -> Result<Self> {
        url::Url::parse(base_url)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn with_default_client(base_url: &str) -> Result<Self> {
        let http = create_client_builder().build()?;
        Self::new(base_url, http)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Query `GET /api_version`. This endpoint is not versioned and does not
    /// use the envelope.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn api_version(&self) -> Result<ApiVersion> {
        let response = self
            .http
            .get(format!("{}/api_version", self.base_url))
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(FreeboxError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// Probe the version endpoint and build the versioned API root.
    pub async fn resolve_api(&self) -> Result<ApiBase> {
        let version = self.api_version().await?;
        let major = parse_major_version(&version.api_version)?;
        debug!(api_version = %version.api_version, major, "Resolved Freebox API base");
        Ok(ApiBase::new(&self.base_url, major))
    }

    /// Send a request and decode the envelope.
    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<FreeboxResponse<T>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        trace!(%status, bytes = body.len(), "Freebox response");
        decode_envelope(status, &body)
    }
}

/// Decode a response body. 2xx bodies must be envelopes; non-2xx bodies are
/// kept as structured errors when they carry one.
pub fn decode_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
) -> Result<FreeboxResponse<T>> {
    if status.is_success() {
        return serde_json::from_slice(body).map_err(|e| FreeboxError::Decode {
            status,
            message: e.to_string(),
        });
    }

    match serde_json::from_slice::<FreeboxResponse<serde_json::Value>>(body) {
        Ok(envelope) => Err(FreeboxError::Api { status, envelope }),
        Err(_) => Err(FreeboxError::Status {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }),
    }
}
