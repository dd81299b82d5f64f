//! API route modules.

pub mod auth;
pub mod downloads;
pub mod health;

use axum::Router;
use axum::http::HeaderMap;
use bytes::Bytes;
use freebox_api::APP_AUTH_HEADER;
use serde::de::DeserializeOwned;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth::router())
        .nest("/api/downloads", downloads::router())
        .nest("/health", health::router())
        .with_state(state)
}

/// Session token sent by the front-end.
pub(crate) fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(APP_AUTH_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Decode an optional JSON body. An empty body yields the default value.
pub(crate) fn json_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))
}
