//! Create-download request parsing.
//!
//! The proxy accepts one JSON shape and decides the upstream encoding from
//! which field is set: `download_file` (base64) wins over
//! `download_url_list`, which wins over `download_url`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::Bytes;
use freebox_api::AddDownload;
use freebox_api::downloads::AddOptions;
use serde::Deserialize;

use crate::config::parse_bool;
use crate::{Error, Result};

/// File name used for uploads that do not carry one.
pub const DEFAULT_UPLOAD_NAME: &str = "upload.torrent";

/// `download_url_list` as a newline-joined string or a JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum UrlList {
    Joined(String),
    Urls(Vec<String>),
}

impl UrlList {
    pub fn into_urls(self) -> Vec<String> {
        let urls: Vec<String> = match self {
            Self::Joined(joined) => joined.lines().map(String::from).collect(),
            Self::Urls(urls) => urls,
        };
        urls.into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateDownloadRequest {
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub download_url_list: Option<UrlList>,
    /// Base64 file content, optionally as a `data:` URL.
    #[serde(default)]
    pub download_file: Option<String>,
    #[serde(default)]
    pub download_file_name: Option<String>,
    #[serde(flatten)]
    pub options: AddOptions,
}

impl CreateDownloadRequest {
    pub fn into_add(self) -> Result<AddDownload> {
        let options = without_blanks(self.options);

        if let Some(encoded) = non_blank(self.download_file) {
            let content = decode_file(&encoded)?;
            let file_name = non_blank(self.download_file_name)
                .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
            return Ok(AddDownload::File {
                file_name,
                content,
                options,
            });
        }

        if let Some(list) = self.download_url_list {
            let urls = list.into_urls();
            if !urls.is_empty() {
                return Ok(AddDownload::UrlList { urls, options });
            }
        }

        if let Some(url) = non_blank(self.download_url) {
            return Ok(AddDownload::Url { url, options });
        }

        Err(Error::validation(
            "one of download_url, download_url_list or download_file is required",
        ))
    }
}

/// Set an optional add field from a multipart text part. Returns `false` for
/// names that are not add options.
pub fn apply_option(options: &mut AddOptions, name: &str, value: String) -> Result<bool> {
    if value.is_empty() {
        return Ok(matches!(
            name,
            "download_dir"
                | "recursive"
                | "username"
                | "password"
                | "archive_password"
                | "cookies"
                | "hash"
        ));
    }
    let slot = match name {
        "download_dir" => &mut options.download_dir,
        "username" => &mut options.username,
        "password" => &mut options.password,
        "archive_password" => &mut options.archive_password,
        "cookies" => &mut options.cookies,
        "hash" => &mut options.hash,
        "recursive" => {
            let recursive = parse_bool(&value)
                .ok_or_else(|| Error::validation(format!("invalid recursive value: {value}")))?;
            options.recursive = Some(recursive);
            return Ok(true);
        }
        _ => return Ok(false),
    };
    *slot = Some(value);
    Ok(true)
}

fn decode_file(encoded: &str) -> Result<Bytes> {
    let payload = match encoded.split_once("base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let content = BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::validation(format!("download_file is not valid base64: {e}")))?;
    if content.is_empty() {
        return Err(Error::validation("download_file is empty"));
    }
    Ok(Bytes::from(content))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn without_blanks(options: AddOptions) -> AddOptions {
    AddOptions {
        download_dir: non_blank(options.download_dir),
        recursive: options.recursive,
        username: non_blank(options.username),
        password: non_blank(options.password),
        archive_password: non_blank(options.archive_password),
        cookies: non_blank(options.cookies),
        hash: non_blank(options.hash),
    }
}
