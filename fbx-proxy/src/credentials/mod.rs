//! Credential persistence.
//!
//! The proxy holds a single long-lived [`AppCredential`]: the app token minted
//! by the Freebox when the application is registered, together with the id
//! used to track the user's approval.
//!
//! - [`CredentialStore`]: persistence seam used by the auth engine
//! - [`FileCredentialStore`]: JSON file in the data directory
//! - [`MemoryCredentialStore`]: in-process store for tests and embedding

mod error;
mod file;
mod store;
mod types;

pub use error::CredentialError;
pub use file::{FileCredentialStore, TOKEN_FILE_NAME};
pub use store::{CredentialStore, MemoryCredentialStore};
pub use types::AppCredential;
