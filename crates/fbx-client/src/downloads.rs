//! Views over a download list and download-path helpers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use freebox_api::models::{Download, DownloadStatus};

/// Subsets of a download list shown separately by a front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadFilter {
    /// Transferring or verifying data.
    Active,
    Completed,
    Errored,
    Queued,
}

impl DownloadFilter {
    pub fn matches(&self, download: &Download) -> bool {
        match self {
            Self::Active => matches!(
                download.status,
                DownloadStatus::Downloading | DownloadStatus::Checking
            ),
            Self::Completed => download.status == DownloadStatus::Done,
            Self::Errored => download.status == DownloadStatus::Error,
            Self::Queued => download.status == DownloadStatus::Queued,
        }
    }

    pub fn apply<'a>(&self, downloads: &'a [Download]) -> Vec<&'a Download> {
        downloads.iter().filter(|d| self.matches(d)).collect()
    }
}

/// Sum of download rates, in bytes per second.
pub fn total_rx_rate(downloads: &[Download]) -> u64 {
    downloads.iter().map(|d| d.rx_rate).sum()
}

/// Sum of upload rates, in bytes per second.
pub fn total_tx_rate(downloads: &[Download]) -> u64 {
    downloads.iter().map(|d| d.tx_rate).sum()
}

/// Join a sub directory onto the base download directory.
///
/// Both the input base and the result are base64-encoded paths, as the
/// Freebox expects them. Returns `None` for an empty sub path (use the
/// default directory) or when the base does not decode.
pub fn build_download_path(base_b64: &str, sub_path: &str) -> Option<String> {
    let sub_path = sub_path.trim();
    if sub_path.is_empty() {
        return None;
    }

    let mut full_path = BASE64_STANDARD.decode(base_b64.trim()).ok()?;
    if !full_path.ends_with(b"/") {
        full_path.push(b'/');
    }
    full_path.extend_from_slice(sub_path.strip_prefix('/').unwrap_or(sub_path).as_bytes());

    Some(BASE64_STANDARD.encode(full_path))
}
