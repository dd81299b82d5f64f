//! HTTP surface of the proxy.
//!
//! `/api/auth` drives the login handshake, `/api/downloads` forwards download
//! manager calls for the session named in the `X-Fbx-App-Auth` header.

pub mod error;
pub mod routes;
pub mod server;

pub use server::ApiServer;
