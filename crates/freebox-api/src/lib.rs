//! # freebox-api
//!
//! Async client for the Freebox OS HTTP API.
//!
//! Covers the application login handshake (authorization request, tracking,
//! challenge/HMAC session opening, logout) and the download manager
//! endpoints. The client is stateless: callers resolve the versioned API base
//! with [`FreeboxClient::resolve_api`] and pass it to every call, together
//! with the session token where the endpoint requires one.
//!
//! ```ignore
//! use freebox_api::{FreeboxClient, compute_password};
//!
//! let client = FreeboxClient::with_default_client("http://mafreebox.freebox.fr")?;
//! let api = client.resolve_api().await?;
//! let challenge = client.login_challenge(&api).await?;
//! ```

pub mod auth;
pub mod client;
pub mod downloads;
pub mod error;
pub mod models;
pub mod response;

pub use auth::compute_password;
pub use client::{
    APP_AUTH_HEADER, ApiBase, DEFAULT_BASE_URL, FreeboxClient, create_client_builder,
    install_rustls_provider, parse_major_version,
};
pub use downloads::AddDownload;
pub use error::FreeboxError;
pub use response::{FreeboxResponse, Outcome};

/// Result type for Freebox API calls.
pub type Result<T> = std::result::Result<T, FreeboxError>;
