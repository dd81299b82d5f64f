//! Application authorization and session login against the Freebox.

mod engine;

pub use engine::{AuthEngine, CredentialCheck, UNCONFIRMED_LOGOUT_MSG};
