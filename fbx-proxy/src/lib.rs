//! fbx-proxy library crate.
//!
//! HTTP front-end for the Freebox router API: application authorization,
//! session login and download management. The binary wires these modules
//! together; they are exposed here for integration testing.

pub mod api;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod logging;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
