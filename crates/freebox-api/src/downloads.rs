//! Download manager endpoints. All calls require a session token.
//!
//! Task, stats and config payloads are returned as raw JSON so they can be
//! forwarded exactly as the box sent them. [`crate::models::Download`] and
//! friends are the typed views.

use bytes::Bytes;
use reqwest::RequestBuilder;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::Result;
use crate::client::{APP_AUTH_HEADER, ApiBase, FreeboxClient};
use crate::response::FreeboxResponse;

/// Optional fields accepted by `POST /downloads/add`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOptions {
    /// Base64-encoded destination directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl AddOptions {
    /// Present fields as string pairs, for form and multipart encodings.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        let text = [
            ("download_dir", &self.download_dir),
            ("username", &self.username),
            ("password", &self.password),
            ("archive_password", &self.archive_password),
            ("cookies", &self.cookies),
            ("hash", &self.hash),
        ];
        for (name, value) in text {
            if let Some(value) = value {
                fields.push((name, value.clone()));
            }
        }
        if let Some(recursive) = self.recursive {
            fields.push(("recursive", recursive.to_string()));
        }
        fields
    }
}

/// What to add. Each shape has its own upstream encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum AddDownload {
    /// A single URL or magnet link, sent as a JSON body.
    Url { url: String, options: AddOptions },
    /// Several URLs joined by newlines, sent form-encoded.
    UrlList {
        urls: Vec<String>,
        options: AddOptions,
    },
    /// A `.torrent` / `.nzb` payload, sent as multipart.
    File {
        file_name: String,
        content: Bytes,
        options: AddOptions,
    },
}

impl AddDownload {
    pub fn options(&self) -> &AddOptions {
        match self {
            Self::Url { options, .. }
            | Self::UrlList { options, .. }
            | Self::File { options, .. } => options,
        }
    }

    pub fn encoding(&self) -> &'static str {
        match self {
            Self::Url { .. } => "json",
            Self::UrlList { .. } => "form",
            Self::File { .. } => "multipart",
        }
    }
}

#[derive(Serialize)]
struct UrlBody<'a> {
    download_url: &'a str,
    #[serde(flatten)]
    options: &'a AddOptions,
}

impl FreeboxClient {
    fn authed(&self, request: RequestBuilder, session_token: &str) -> RequestBuilder {
        request.header(APP_AUTH_HEADER, session_token)
    }

    #[instrument(skip_all)]
    pub async fn list_downloads(
        &self,
        api: &ApiBase,
        session_token: &str,
    ) -> Result<FreeboxResponse<Value>> {
        let request = self.authed(self.http().get(api.endpoint("downloads/")), session_token);
        self.send(request).await
    }

    #[instrument(skip(self, api, session_token))]
    pub async fn get_download(
        &self,
        api: &ApiBase,
        session_token: &str,
        id: u64,
    ) -> Result<FreeboxResponse<Value>> {
        let request = self.authed(
            self.http().get(api.endpoint(&format!("downloads/{id}"))),
            session_token,
        );
        self.send(request).await
    }

    #[instrument(skip_all, fields(encoding = add.encoding()))]
    pub async fn add_download(
        &self,
        api: &ApiBase,
        session_token: &str,
        add: &AddDownload,
    ) -> Result<FreeboxResponse<Value>> {
        let request = self.http().post(api.endpoint("downloads/add"));
        let request = match add {
            AddDownload::Url { url, options } => request.json(&UrlBody {
                download_url: url,
                options,
            }),
            AddDownload::UrlList { urls, options } => {
                let mut fields = vec![("download_url_list", urls.join("\n"))];
                fields.extend(options.fields());
                request.form(&fields)
            }
            AddDownload::File {
                file_name,
                content,
                options,
            } => {
                let part = Part::bytes(content.to_vec()).file_name(file_name.clone());
                let mut form = Form::new().part("download_file", part);
                for (name, value) in options.fields() {
                    form = form.text(name, value);
                }
                request.multipart(form)
            }
        };

        let response = self.send(self.authed(request, session_token)).await?;
        if !response.success {
            debug!(
                error_code = ?response.error_code,
                msg = ?response.msg,
                "Freebox rejected download"
            );
        }
        Ok(response)
    }

    /// `PUT /downloads/{id}` with a partial body, forwarded as given.
    #[instrument(skip(self, api, session_token, patch))]
    pub async fn update_download<P: Serialize + ?Sized>(
        &self,
        api: &ApiBase,
        session_token: &str,
        id: u64,
        patch: &P,
    ) -> Result<FreeboxResponse<Value>> {
        let request = self.authed(
            self.http()
                .put(api.endpoint(&format!("downloads/{id}")))
                .json(patch),
            session_token,
        );
        self.send(request).await
    }

    /// Remove the task, keeping downloaded files.
    #[instrument(skip(self, api, session_token))]
    pub async fn delete_download(
        &self,
        api: &ApiBase,
        session_token: &str,
        id: u64,
    ) -> Result<FreeboxResponse<Value>> {
        let request = self.authed(
            self.http().delete(api.endpoint(&format!("downloads/{id}"))),
            session_token,
        );
        self.send(request).await
    }

    /// Remove the task and its files.
    #[instrument(skip(self, api, session_token))]
    pub async fn erase_download(
        &self,
        api: &ApiBase,
        session_token: &str,
        id: u64,
    ) -> Result<FreeboxResponse<Value>> {
        let request = self.authed(
            self.http()
                .delete(api.endpoint(&format!("downloads/{id}/erase"))),
            session_token,
        );
        self.send(request).await
    }

    #[instrument(skip_all)]
    pub async fn download_stats(
        &self,
        api: &ApiBase,
        session_token: &str,
    ) -> Result<FreeboxResponse<Value>> {
        let request = self.authed(
            self.http().get(api.endpoint("downloads/stats")),
            session_token,
        );
        self.send(request).await
    }

    #[instrument(skip_all)]
    pub async fn download_config(
        &self,
        api: &ApiBase,
        session_token: &str,
    ) -> Result<FreeboxResponse<Value>> {
        let request = self.authed(
            self.http().get(api.endpoint("downloads/config/")),
            session_token,
        );
        self.send(request).await
    }

    /// Task log as a single newline-separated string.
    #[instrument(skip(self, api, session_token))]
    pub async fn download_log(
        &self,
        api: &ApiBase,
        session_token: &str,
        id: u64,
    ) -> Result<FreeboxResponse<String>> {
        let request = self.authed(
            self.http().get(api.endpoint(&format!("downloads/{id}/log"))),
            session_token,
        );
        self.send(request).await
    }
}
