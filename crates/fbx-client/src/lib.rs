//! # fbx-client
//!
//! Client side of the fbx-proxy HTTP surface.
//!
//! [`ProxyClient`] maps each proxy route to a typed call. [`SessionController`]
//! sits on top of it and keeps the app and session tokens in an explicit
//! [`SessionContext`], persisted across restarts through a
//! [`TokenPersistence`] implementation chosen by the caller.
//!
//! ```ignore
//! use std::sync::Arc;
//! use fbx_client::{MemoryPersistence, PollPolicy, ProxyClient, SessionController};
//!
//! let proxy = ProxyClient::new("http://localhost:3000")?;
//! let mut controller = SessionController::new(proxy, Arc::new(MemoryPersistence::new()));
//! if !controller.start().await? {
//!     let track_id = controller.register().await?;
//!     controller.await_authorization(track_id, PollPolicy::default()).await?;
//! }
//! controller.login().await?;
//! let downloads = controller.fetch_downloads().await?;
//! ```

pub mod downloads;
pub mod error;
pub mod persistence;
pub mod proxy;
pub mod session;

pub use downloads::{DownloadFilter, build_download_path, total_rx_rate, total_tx_rate};
pub use error::{ClientError, Result};
pub use persistence::{
    APP_TOKEN_KEY, FilePersistence, MemoryPersistence, SESSION_TOKEN_KEY, TokenPersistence,
};
pub use proxy::{CredentialCheck, ProxyClient, StoredToken};
pub use session::{PollPolicy, SessionContext, SessionController};
