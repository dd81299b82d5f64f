//! Best-effort error details for failed downloads.
//!
//! The download list only carries an error code. For each failing task the
//! gateway fetches the task log and keeps the tracker's last failure reason.
//! Lookups run on a bounded [`JoinSet`] and are joined against a deadline;
//! whatever has not answered by then is dropped.

use std::sync::Arc;
use std::time::Duration;

use freebox_api::{ApiBase, FreeboxClient};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::debug;

const TRACKER_MARKERS: [&str; 2] = ["tracker failure reason:", "tracker error:"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentConfig {
    /// Maximum number of concurrent log requests.
    pub concurrency: usize,
    /// Deadline for all log requests of one listing.
    pub timeout: Duration,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout: Duration::from_secs(2),
        }
    }
}

/// Extract the reason from the last tracker failure line of a task log.
pub fn tracker_failure_reason(log: &str) -> Option<String> {
    let line = log
        .lines()
        .rev()
        .find(|line| TRACKER_MARKERS.iter().any(|marker| line.contains(marker)))?;

    ["reason: ", "error: "].iter().find_map(|prefix| {
        let start = line.find(prefix)? + prefix.len();
        let reason = line[start..].trim();
        (!reason.is_empty()).then(|| reason.to_string())
    })
}

/// Id of a task whose `error` is set. The box reports `"none"` when a task
/// has no error.
fn failing_task_id(download: &Value) -> Option<u64> {
    let error = download.get("error")?.as_str()?;
    if error.is_empty() || error == "none" {
        return None;
    }
    download.get("id")?.as_u64()
}

/// Fill `error_details` on failing downloads. Never fails, and leaves every
/// other field untouched.
pub(crate) async fn enrich_errors(
    client: &FreeboxClient,
    api: &ApiBase,
    session_token: &str,
    downloads: &mut [Value],
    config: &EnrichmentConfig,
) {
    let failing: Vec<(usize, u64)> = downloads
        .iter()
        .enumerate()
        .filter_map(|(index, download)| Some((index, failing_task_id(download)?)))
        .collect();
    if failing.is_empty() {
        return;
    }

    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for (index, id) in failing {
        let client = client.clone();
        let api = api.clone();
        let session_token = session_token.to_string();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            let response = match client.download_log(&api, &session_token, id).await {
                Ok(response) => response,
                Err(e) => {
                    debug!(id, error = %e, "Could not fetch download log");
                    return None;
                }
            };
            if !response.success {
                return None;
            }
            tracker_failure_reason(&response.result?).map(|reason| (index, reason))
        });
    }

    let deadline = Instant::now() + config.timeout;
    let mut enriched = 0usize;
    loop {
        let next = tokio::time::timeout_at(deadline, tasks.join_next()).await;
        match next {
            Ok(Some(Ok(Some((index, reason))))) => {
                if let Some(task) = downloads[index].as_object_mut() {
                    task.insert("error_details".to_string(), Value::String(reason));
                    enriched += 1;
                }
            }
            Ok(Some(Ok(None))) => {}
            Ok(Some(Err(e))) => debug!(error = %e, "Log lookup task failed"),
            Ok(None) => break,
            Err(_) => {
                debug!(pending = tasks.len(), "Log lookups timed out");
                tasks.abort_all();
                break;
            }
        }
    }
    debug!(enriched, "Download error details");
}
