//! Session-scoped access to the Freebox download manager.
//!
//! Every operation requires the caller's session token; a missing token is
//! rejected before any upstream request, version probe included.

mod enrich;
mod request;
mod service;

pub use enrich::{EnrichmentConfig, tracker_failure_reason};
pub use request::{CreateDownloadRequest, DEFAULT_UPLOAD_NAME, UrlList, apply_option};
pub use service::DownloadGateway;
