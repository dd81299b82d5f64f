//! Auth handshake routes.
//!
//! A single path dispatches on `?action=`:
//!
//! | Method | Action     | Effect                                   |
//! |--------|------------|------------------------------------------|
//! | GET    | (none)     | Freebox version information              |
//! | GET    | `check`    | Whether an app token is stored           |
//! | GET    | `track`    | Authorization status for `track_id`      |
//! | POST   | `register` | Request a new app token                  |
//! | POST   | `login`    | Open a session from `{app_token}`        |
//! | POST   | `logout`   | Close `{session_token}`, forget the token |
//!
//! Anything else is a bad request.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use serde::Deserialize;

use super::{json_body, session_token};
use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::auth::AuthEngine;

/// Create the auth router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(query).post(command).fallback(unsupported))
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub action: Option<String>,
    pub track_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoginBody {
    #[serde(default)]
    app_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct LogoutBody {
    #[serde(default)]
    session_token: Option<String>,
}

fn engine(state: &AppState) -> ApiResult<&Arc<AuthEngine>> {
    state
        .auth
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Auth service not available"))
}

fn parse_query(query: Result<Query<AuthQuery>, QueryRejection>) -> ApiResult<AuthQuery> {
    query
        .map(|Query(q)| q)
        .map_err(|e| ApiError::bad_request(format!("Invalid query: {e}")))
}

async fn query(
    State(state): State<AppState>,
    query: Result<Query<AuthQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let params = parse_query(query)?;
    let engine = engine(&state)?;

    match params.action.as_deref() {
        None | Some("") => Ok(Json(engine.version().await?).into_response()),
        Some("check") => Ok(Json(engine.check().await?).into_response()),
        Some("track") => {
            let track_id = params
                .track_id
                .ok_or_else(|| ApiError::bad_request("track_id is required"))?;
            Ok(Json(engine.track(track_id).await?).into_response())
        }
        Some(other) => Err(unsupported_action(&Method::GET, other)),
    }
}

async fn command(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<AuthQuery>, QueryRejection>,
    body: Bytes,
) -> ApiResult<Response> {
    let params = parse_query(query)?;
    let engine = engine(&state)?;

    match params.action.as_deref().unwrap_or_default() {
        "register" => Ok(Json(engine.register().await?).into_response()),
        "login" => {
            let body: LoginBody = json_body(&body)?;
            Ok(Json(engine.login(body.app_token.trim()).await?).into_response())
        }
        "logout" => {
            let body: LogoutBody = json_body(&body)?;
            let token = body
                .session_token
                .filter(|token| !token.trim().is_empty())
                .or_else(|| session_token(&headers).map(String::from))
                .unwrap_or_default();
            Ok(Json(engine.logout(token.trim()).await?).into_response())
        }
        other => Err(unsupported_action(&Method::POST, other)),
    }
}

async fn unsupported(method: Method) -> ApiError {
    ApiError::bad_request(format!("Method {method} is not supported on /api/auth"))
}

fn unsupported_action(method: &Method, action: &str) -> ApiError {
    ApiError::bad_request(format!("Unsupported action '{action}' for {method}"))
}
