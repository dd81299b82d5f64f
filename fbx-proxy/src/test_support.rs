//! In-process Freebox double for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use freebox_api::{FreeboxClient, compute_password};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub(crate) const TEST_APP_TOKEN: &str =
    "dyNYgfK0Ya6FWGqq83sBHa7TwzWo+pg4fDFUJHShcjVYzTfaRrZzm93p7OTAfH/0";
pub(crate) const TEST_CHALLENGE: &str = "VzhbWpxRqvh/VS/bov6YoZV3LMQxlw3h";
pub(crate) const TEST_SESSION_TOKEN: &str =
    "35JYdQSvkcBYK84IFMU7H86clfhS75OzwlQrKlQN1gBch/Dd62RGzDpgC7YB9jB2";

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub auth: Option<String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn body_json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Behaviour of the double.
#[derive(Debug, Clone)]
pub(crate) struct FakeConfig {
    pub registration_granted: bool,
    pub track_status: String,
    pub challenge: Option<String>,
    pub logout_status: StatusCode,
    pub downloads: Value,
    /// Raw 200 body for the download list, replacing the envelope.
    pub downloads_body: Option<String>,
    pub logs: HashMap<u64, String>,
    pub log_delay: Duration,
}

impl Default for FakeConfig {
    fn default() -> Self {
        Self {
            registration_granted: true,
            track_status: "pending".to_string(),
            challenge: Some(TEST_CHALLENGE.to_string()),
            logout_status: StatusCode::OK,
            downloads: json!([]),
            downloads_body: None,
            logs: HashMap::new(),
            log_delay: Duration::ZERO,
        }
    }
}

struct FakeState {
    config: FakeConfig,
    hits: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
}

pub(crate) struct FakeBox {
    pub base_url: String,
    state: Arc<FakeState>,
}

impl FakeBox {
    pub async fn spawn(config: FakeConfig) -> Self {
        let state = Arc::new(FakeState {
            config,
            hits: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/api_version", get(api_version))
            .route("/api/v8/login", get(login_challenge))
            .route("/api/v8/login/authorize", post(authorize))
            .route("/api/v8/login/authorize/{id}", get(track))
            .route("/api/v8/login/session", post(open_session))
            .route("/api/v8/login/logout", post(logout))
            .route("/api/v8/downloads/", get(list_downloads))
            .route("/api/v8/downloads/add", post(add_download))
            .route("/api/v8/downloads/stats", get(stats))
            .route("/api/v8/downloads/config/", get(download_config))
            .route(
                "/api/v8/downloads/{id}",
                get(get_download).put(update_download).delete(ok),
            )
            .route("/api/v8/downloads/{id}/erase", delete(ok))
            .route("/api/v8/downloads/{id}/log", get(download_log))
            .layer(middleware::from_fn_with_state(state.clone(), record))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn client(&self) -> FreeboxClient {
        FreeboxClient::with_default_client(&self.base_url).unwrap()
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    /// Requests to `path`, ignoring the version probes.
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

/// An address nothing listens on.
pub(crate) async fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn record(State(state): State<Arc<FakeState>>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.requests.lock().push(RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        content_type: header(CONTENT_TYPE.as_str()),
        auth: header("X-Fbx-App-Auth"),
        body: bytes.to_vec(),
    });
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn api_version() -> Json<Value> {
    Json(json!({
        "uid": "23b86ec8091013d668829fe12791fdab",
        "device_name": "Freebox Server",
        "api_version": "8.4",
        "api_base_url": "/api/",
        "device_type": "FreeboxServer1,2"
    }))
}

async fn authorize(State(state): State<Arc<FakeState>>) -> Json<Value> {
    if state.config.registration_granted {
        Json(json!({"success": true, "result": {"app_token": TEST_APP_TOKEN, "track_id": 42}}))
    } else {
        Json(json!({
            "success": false,
            "error_code": "denied_from_external_ip",
            "msg": "Refused from external IP"
        }))
    }
}

async fn track(State(state): State<Arc<FakeState>>, Path(_id): Path<u64>) -> Json<Value> {
    Json(json!({
        "success": true,
        "result": {"status": state.config.track_status, "challenge": TEST_CHALLENGE}
    }))
}

async fn login_challenge(State(state): State<Arc<FakeState>>) -> Json<Value> {
    match &state.config.challenge {
        Some(challenge) => Json(json!({
            "success": true,
            "result": {"logged_in": false, "challenge": challenge}
        })),
        None => Json(json!({"success": true, "result": {"logged_in": false}})),
    }
}

async fn open_session(
    State(state): State<Arc<FakeState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let expected = state
        .config
        .challenge
        .as_deref()
        .map(|challenge| compute_password(TEST_APP_TOKEN, challenge));
    if expected.as_deref() == body["password"].as_str() {
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "result": {
                    "session_token": TEST_SESSION_TOKEN,
                    "challenge": "next",
                    "permissions": {"downloader": true, "settings": false}
                }
            })),
        )
    } else {
        (
            StatusCode::FORBIDDEN,
            Json(json!({
                "success": false,
                "error_code": "invalid_token",
                "msg": "Invalid password"
            })),
        )
    }
}

async fn logout(State(state): State<Arc<FakeState>>) -> Response {
    let status = state.config.logout_status;
    if status.is_success() {
        Json(json!({"success": true})).into_response()
    } else {
        (status, "internal error").into_response()
    }
}

async fn list_downloads(State(state): State<Arc<FakeState>>) -> Response {
    match &state.config.downloads_body {
        Some(body) => (StatusCode::OK, body.clone()).into_response(),
        None => Json(json!({"success": true, "result": state.config.downloads})).into_response(),
    }
}

async fn get_download(
    State(state): State<Arc<FakeState>>,
    Path(id): Path<u64>,
) -> (StatusCode, Json<Value>) {
    let found = state
        .config
        .downloads
        .as_array()
        .and_then(|all| all.iter().find(|d| d["id"] == id).cloned());
    match found {
        Some(download) => (StatusCode::OK, Json(json!({"success": true, "result": download}))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error_code": "task_not_found", "msg": "No such task"})),
        ),
    }
}

async fn update_download(Path(id): Path<u64>, Json(patch): Json<Value>) -> Json<Value> {
    let mut result = json!({"id": id});
    if let (Some(target), Some(fields)) = (result.as_object_mut(), patch.as_object()) {
        target.extend(fields.clone());
    }
    Json(json!({"success": true, "result": result}))
}

async fn ok() -> Json<Value> {
    Json(json!({"success": true}))
}

async fn add_download() -> Json<Value> {
    Json(json!({"success": true, "result": {"id": 99}}))
}

async fn stats() -> Json<Value> {
    Json(json!({
        "success": true,
        "result": {
            "nb_tasks": 3,
            "nb_tasks_downloading": 1,
            "rx_rate": 2048,
            "tx_rate": 512,
            "conn_ready": true
        }
    }))
}

async fn download_config() -> Json<Value> {
    Json(json!({
        "success": true,
        "result": {
            "download_dir": "L0Rpc3F1ZSBkdXIvVMOpbMOpY2hhcmdlbWVudHM=",
            "max_downloading_tasks": 5
        }
    }))
}

async fn download_log(State(state): State<Arc<FakeState>>, Path(id): Path<u64>) -> Response {
    if !state.config.log_delay.is_zero() {
        tokio::time::sleep(state.config.log_delay).await;
    }
    match state.config.logs.get(&id) {
        Some(log) => Json(json!({"success": true, "result": log})).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "log unavailable").into_response(),
    }
}

/// A download in `status` with the given error code.
pub(crate) fn download(id: u64, status: &str, error: &str) -> Value {
    json!({
        "id": id,
        "name": format!("task-{id}"),
        "status": status,
        "type": "bt",
        "size": 1000,
        "rx_bytes": 10,
        "tx_bytes": 0,
        "rx_rate": 100,
        "tx_rate": 5,
        "rx_pct": 100,
        "eta": 60,
        "created_ts": 1700000000,
        "error": error,
        "queue_pos": 1,
        "stop_ratio": 150,
        "download_dir": "L0Rpc3F1ZSBkdXI=",
        "io_priority": "normal"
    })
}
