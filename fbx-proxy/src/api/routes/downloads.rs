//! Download manager routes.
//!
//! All routes read the session token from `X-Fbx-App-Auth` and answer with
//! the Freebox envelope unchanged.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Query, State, multipart::MultipartRejection, rejection::QueryRejection},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use bytes::Bytes;
use freebox_api::AddDownload;
use freebox_api::downloads::AddOptions;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{json_body, session_token};
use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::gateway::{CreateDownloadRequest, DEFAULT_UPLOAD_NAME, DownloadGateway, apply_option};

/// Create the downloads router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_or_get)
                .post(create_download)
                .put(update_download)
                .delete(delete_download),
        )
        .route("/stats", get(download_stats))
        .route("/config", get(download_config))
        .route("/log", get(download_log))
        .route("/erase", delete(erase_download))
        .route("/upload", post(upload_download))
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    #[serde(default, alias = "downloadId")]
    pub id: Option<u64>,
}

fn gateway(state: &AppState) -> ApiResult<&Arc<DownloadGateway>> {
    state
        .gateway
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Download service not available"))
}

/// Session and id checks shared by the per-task routes. The session is
/// checked first so an anonymous caller always gets a 401.
fn task_id<'a>(
    headers: &'a HeaderMap,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> ApiResult<(&'a str, u64)> {
    let token = DownloadGateway::require_session(session_token(headers))?;
    let Query(params) = query.map_err(|e| ApiError::bad_request(format!("Invalid query: {e}")))?;
    let id = params
        .id
        .ok_or_else(|| ApiError::bad_request("id is required"))?;
    Ok((token, id))
}

async fn list_or_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let gateway = gateway(&state)?;
    let token = DownloadGateway::require_session(session_token(&headers))?;
    let Query(params) = query.map_err(|e| ApiError::bad_request(format!("Invalid query: {e}")))?;

    match params.id {
        Some(id) => Ok(Json(gateway.get(Some(token), id).await?).into_response()),
        None => Ok(Json(gateway.list(Some(token)).await?).into_response()),
    }
}

async fn create_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let gateway = gateway(&state)?;
    let token = DownloadGateway::require_session(session_token(&headers))?;
    let request: CreateDownloadRequest = json_body(&body)?;
    let add = request.into_add()?;
    Ok(Json(gateway.create(Some(token), &add).await?).into_response())
}

async fn update_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<DownloadQuery>, QueryRejection>,
    body: Bytes,
) -> ApiResult<Response> {
    let gateway = gateway(&state)?;
    let (token, id) = task_id(&headers, query)?;
    let patch: Value = json_body(&body)?;
    if !patch.is_object() {
        return Err(ApiError::bad_request("update body must be a JSON object"));
    }
    Ok(Json(gateway.update(Some(token), id, &patch).await?).into_response())
}

async fn delete_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let gateway = gateway(&state)?;
    let (token, id) = task_id(&headers, query)?;
    Ok(Json(gateway.delete(Some(token), id).await?).into_response())
}

async fn erase_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let gateway = gateway(&state)?;
    let (token, id) = task_id(&headers, query)?;
    Ok(Json(gateway.erase(Some(token), id).await?).into_response())
}

async fn download_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let gateway = gateway(&state)?;
    let (token, id) = task_id(&headers, query)?;
    Ok(Json(gateway.log(Some(token), id).await?).into_response())
}

async fn download_stats(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let gateway = gateway(&state)?;
    Ok(Json(gateway.stats(session_token(&headers)).await?).into_response())
}

async fn download_config(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let gateway = gateway(&state)?;
    Ok(Json(gateway.config(session_token(&headers)).await?).into_response())
}

/// Add a task from an uploaded file (`download_file` part), with the same
/// optional fields as the JSON create.
async fn upload_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let gateway = gateway(&state)?;
    let token = DownloadGateway::require_session(session_token(&headers))?;
    let mut multipart =
        multipart.map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?;

    let mut file: Option<(String, Bytes)> = None;
    let mut options = AddOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        let Some(name) = field.name().map(String::from) else {
            continue;
        };
        if name == "download_file" {
            let file_name = field
                .file_name()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(DEFAULT_UPLOAD_NAME)
                .to_string();
            let content = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
            file = Some((file_name, content));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid field {name}: {e}")))?;
        if !apply_option(&mut options, &name, value)? {
            debug!(field = %name, "Ignoring unknown upload field");
        }
    }

    let (file_name, content) = file
        .filter(|(_, content)| !content.is_empty())
        .ok_or_else(|| ApiError::bad_request("download_file is required"))?;

    let add = AddDownload::File {
        file_name,
        content,
        options,
    };
    Ok(Json(gateway.create(Some(token), &add).await?).into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::api::routes::create_router;
    use crate::api::server::AppState;
    use crate::gateway::{DownloadGateway, EnrichmentConfig};
    use crate::test_support::{FakeBox, FakeConfig, TEST_SESSION_TOKEN, download};

    const BOUNDARY: &str = "X-FBX-TEST-BOUNDARY";

    fn state_for(fake: &FakeBox) -> AppState {
        let gateway = DownloadGateway::new(fake.client(), EnrichmentConfig::default());
        AppState::new().with_gateway(Arc::new(gateway))
    }

    async fn send(state: AppState, request: HttpRequest<Body>) -> (StatusCode, Value) {
        let response = create_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
        HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header("X-Fbx-App-Auth", TEST_SESSION_TOKEN)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> HttpRequest<Body> {
        authed(method, uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/x-bittorrent\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    #[tokio::test]
    async fn test_anonymous_requests_are_rejected_locally() {
        let fake = FakeBox::spawn(FakeConfig::default()).await;
        let state = state_for(&fake);

        for (method, uri) in [
            ("GET", "/api/downloads"),
            ("GET", "/api/downloads?id=1"),
            ("POST", "/api/downloads"),
            ("PUT", "/api/downloads"),
            ("DELETE", "/api/downloads?id=1"),
            ("GET", "/api/downloads/stats"),
            ("GET", "/api/downloads/config"),
            ("GET", "/api/downloads/log?id=1"),
            ("DELETE", "/api/downloads/erase?id=1"),
            ("POST", "/api/downloads/upload"),
        ] {
            let request = HttpRequest::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let (status, body) = send(state.clone(), request).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body["success"], false);
            assert_eq!(body["error_code"], "unauthorized");
        }
        assert_eq!(fake.hits(), 0);
    }

    #[tokio::test]
    async fn test_list_and_get() {
        let fake = FakeBox::spawn(FakeConfig {
            downloads: json!([download(1, "done", "none"), download(2, "stopped", "none")]),
            ..FakeConfig::default()
        })
        .await;
        let state = state_for(&fake);

        let request = authed("GET", "/api/downloads").body(Body::empty()).unwrap();
        let (status, body) = send(state.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"].as_array().unwrap().len(), 2);
        assert_eq!(body["result"][0]["io_priority"], "normal");

        let request = authed("GET", "/api/downloads?id=2").body(Body::empty()).unwrap();
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["name"], "task-2");
    }

    #[tokio::test]
    async fn test_list_forwards_unfamiliar_records_verbatim() {
        let task = json!({
            "id": 1,
            "status": "paused",
            "type": "magnet",
            "info_hash": null,
            "error": "none"
        });
        let fake = FakeBox::spawn(FakeConfig {
            downloads: json!([task.clone()]),
            ..FakeConfig::default()
        })
        .await;

        let request = authed("GET", "/api/downloads").body(Body::empty()).unwrap();
        let (status, body) = send(state_for(&fake), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "result": [task]}));
    }

    #[tokio::test]
    async fn test_upstream_error_envelope_keeps_status() {
        let fake = FakeBox::spawn(FakeConfig::default()).await;
        let request = authed("GET", "/api/downloads?id=7").body(Body::empty()).unwrap();

        let (status, body) = send(state_for(&fake), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            json!({"success": false, "error_code": "task_not_found", "msg": "No such task"})
        );
    }

    #[tokio::test]
    async fn test_json_create() {
        let fake = FakeBox::spawn(FakeConfig::default()).await;
        let request = json_request(
            "POST",
            "/api/downloads",
            json!({"download_url": "magnet:?xt=urn:btih:abc", "download_dir": "ZGly"}),
        );

        let (status, body) = send(state_for(&fake), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["id"], 99);

        let sent = fake.requests_to("/api/v8/downloads/add");
        assert_eq!(
            sent[0].body_json(),
            json!({"download_url": "magnet:?xt=urn:btih:abc", "download_dir": "ZGly"})
        );
    }

    #[tokio::test]
    async fn test_create_without_shape_is_bad_request() {
        let fake = FakeBox::spawn(FakeConfig::default()).await;
        let request = json_request("POST", "/api/downloads", json!({"download_dir": "ZGly"}));

        let (status, body) = send(state_for(&fake), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "bad_request");
        assert_eq!(fake.hits(), 0);
    }

    #[tokio::test]
    async fn test_base64_create_is_sent_as_multipart() {
        let fake = FakeBox::spawn(FakeConfig::default()).await;
        let request = json_request(
            "POST",
            "/api/downloads",
            json!({
                "download_file": "ZDg6YW5ub3VuY2UwOmU=",
                "download_file_name": "debian.torrent"
            }),
        );

        let (status, _) = send(state_for(&fake), request).await;
        assert_eq!(status, StatusCode::OK);

        let sent = fake.requests_to("/api/v8/downloads/add");
        assert!(sent[0].content_type.as_deref().unwrap().starts_with("multipart/form-data"));
        let text = sent[0].body_text();
        assert!(text.contains("filename=\"debian.torrent\""));
        assert!(text.contains("d8:announce0:e"));
    }

    #[tokio::test]
    async fn test_upload_forwards_file_and_fields() {
        let fake = FakeBox::spawn(FakeConfig::default()).await;
        let body = multipart_body(&[
            ("download_file", Some("linux.torrent"), b"d8:announce0:e"),
            ("download_dir", None, b"ZGly"),
            ("unrelated", None, b"ignored"),
        ]);
        let request = authed("POST", "/api/downloads/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        let (status, body) = send(state_for(&fake), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["id"], 99);

        let sent = fake.requests_to("/api/v8/downloads/add");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].content_type.as_deref().unwrap().starts_with("multipart/form-data"));
        let text = sent[0].body_text();
        assert!(text.contains("filename=\"linux.torrent\""));
        assert!(text.contains("name=\"download_dir\""));
        assert!(!text.contains("unrelated"));
    }

    #[tokio::test]
    async fn test_upload_without_file_is_bad_request() {
        let fake = FakeBox::spawn(FakeConfig::default()).await;
        let body = multipart_body(&[("download_dir", None, b"ZGly")]);
        let request = authed("POST", "/api/downloads/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        let (status, _) = send(state_for(&fake), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(fake.hits(), 0);
    }

    #[tokio::test]
    async fn test_update_requires_id() {
        let fake = FakeBox::spawn(FakeConfig::default()).await;
        let request = json_request("PUT", "/api/downloads", json!({"status": "stopped"}));

        let (status, body) = send(state_for(&fake), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
        assert_eq!(fake.hits(), 0);
    }

    #[tokio::test]
    async fn test_update_forwards_patch() {
        let fake = FakeBox::spawn(FakeConfig::default()).await;
        let request = json_request(
            "PUT",
            "/api/downloads?id=5",
            json!({"status": "stopped", "io_priority": "high"}),
        );

        let (status, body) = send(state_for(&fake), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["io_priority"], "high");

        let sent = fake.requests_to("/api/v8/downloads/5");
        assert_eq!(sent[0].method, "PUT");
        assert_eq!(sent[0].body_json(), json!({"status": "stopped", "io_priority": "high"}));
    }

    #[tokio::test]
    async fn test_delete_and_erase() {
        let fake = FakeBox::spawn(FakeConfig::default()).await;
        let state = state_for(&fake);

        let request = authed("DELETE", "/api/downloads?id=3").body(Body::empty()).unwrap();
        assert_eq!(send(state.clone(), request).await.0, StatusCode::OK);
        let request = authed("DELETE", "/api/downloads/erase?id=4").body(Body::empty()).unwrap();
        assert_eq!(send(state.clone(), request).await.0, StatusCode::OK);
        let request = authed("DELETE", "/api/downloads").body(Body::empty()).unwrap();
        assert_eq!(send(state, request).await.0, StatusCode::BAD_REQUEST);

        assert_eq!(fake.requests_to("/api/v8/downloads/3")[0].method, "DELETE");
        assert_eq!(fake.requests_to("/api/v8/downloads/4/erase")[0].method, "DELETE");
    }

    #[tokio::test]
    async fn test_stats_config_and_log() {
        let mut logs = std::collections::HashMap::new();
        logs.insert(8, "line one\nline two".to_string());
        let fake = FakeBox::spawn(FakeConfig {
            logs,
            ..FakeConfig::default()
        })
        .await;
        let state = state_for(&fake);

        let request = authed("GET", "/api/downloads/stats").body(Body::empty()).unwrap();
        let (status, body) = send(state.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["nb_tasks"], 3);
        assert_eq!(body["result"]["conn_ready"], true);

        let request = authed("GET", "/api/downloads/config").body(Body::empty()).unwrap();
        let (_, body) = send(state.clone(), request).await;
        assert_eq!(body["result"]["max_downloading_tasks"], 5);

        let request = authed("GET", "/api/downloads/log?downloadId=8")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "line one\nline two");
    }

    #[tokio::test]
    async fn test_log_without_envelope_keeps_upstream_status() {
        let fake = FakeBox::spawn(FakeConfig::default()).await;
        let request = authed("GET", "/api/downloads/log?id=8").body(Body::empty()).unwrap();

        let (status, body) = send(state_for(&fake), request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error_code"], "upstream_http_error");
    }
}
