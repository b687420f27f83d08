//! In-process stand-in for the Lifeline API used by the integration suite.
//!
//! Serves on an ephemeral port. The refresh endpoint's behavior, an optional
//! response delay (to keep a refresh in flight while other requests pile up),
//! and failure injection for individual routes are all controlled through
//! [`ApiState`]. Every request that presented a valid bearer token is
//! recorded so tests can assert which token a retry carried.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use lifeline_client::{ApiClient, ApiConfig};

pub const INITIAL_TOKEN: &str = "initial-token";
pub const CORRECT_PASSWORD: &str = "correct-horse";

/// How the refresh endpoint answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshMode {
    /// 200 with a freshly minted token.
    Succeed,
    /// 403, the refresh cookie was rejected.
    Deny,
    /// 200 but the payload is missing `accessToken`.
    Malformed,
    /// 401, the refresh cookie itself expired.
    Unauthorized,
}

pub struct ApiState {
    valid_token: Mutex<String>,
    refresh_mode: Mutex<RefreshMode>,
    refresh_calls: AtomicUsize,
    /// Milliseconds the refresh handler stalls before answering.
    refresh_hold_ms: AtomicU64,
    resource_always_401: AtomicBool,
    fail_logout: AtomicBool,
    tokens_minted: AtomicUsize,
    /// `(path, bearer)` for every request that authenticated successfully.
    authorized_hits: Mutex<Vec<(String, String)>>,
}

impl ApiState {
    fn new() -> Self {
        Self {
            valid_token: Mutex::new(INITIAL_TOKEN.to_string()),
            refresh_mode: Mutex::new(RefreshMode::Succeed),
            refresh_calls: AtomicUsize::new(0),
            refresh_hold_ms: AtomicU64::new(0),
            resource_always_401: AtomicBool::new(false),
            fail_logout: AtomicBool::new(false),
            tokens_minted: AtomicUsize::new(0),
            authorized_hits: Mutex::new(Vec::new()),
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn valid_token(&self) -> String {
        self.valid_token.lock().unwrap().clone()
    }

    pub fn authorized_hits(&self) -> Vec<(String, String)> {
        self.authorized_hits.lock().unwrap().clone()
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock().unwrap() = mode;
    }

    pub fn set_refresh_hold(&self, hold: Duration) {
        self.refresh_hold_ms
            .store(hold.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_resource_always_401(&self, always: bool) {
        self.resource_always_401.store(always, Ordering::SeqCst);
    }

    pub fn set_fail_logout(&self, fail: bool) {
        self.fail_logout.store(fail, Ordering::SeqCst);
    }

    fn mint_token(&self, prefix: &str) -> String {
        let n = self.tokens_minted.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("{prefix}-{n}");
        *self.valid_token.lock().unwrap() = token.clone();
        token
    }

    fn authorize(&self, path: &str, headers: &HeaderMap) -> bool {
        let Some(bearer) = bearer(headers) else {
            return false;
        };
        if bearer != *self.valid_token.lock().unwrap() {
            return false;
        }
        self.authorized_hits
            .lock()
            .unwrap()
            .push((path.to_string(), bearer.to_string()));
        true
    }
}

pub struct MockApi {
    pub addr: SocketAddr,
    pub state: Arc<ApiState>,
}

impl MockApi {
    pub fn config(&self) -> ApiConfig {
        ApiConfig::new(format!("http://{}", self.addr).parse().unwrap())
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(self.config()).unwrap()
    }
}

/// Start the mock API on an ephemeral port.
pub async fn spawn() -> MockApi {
    let state = Arc::new(ApiState::new());
    let app = router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockApi { addr, state }
}

fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/auth/refresh-token", post(refresh))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/error", get(server_error))
        .route("/resource", get(resource).delete(delete_resource))
        .route("/a", get(resource))
        .route("/b", get(resource))
        .route("/c", get(resource))
        .route("/d", get(resource))
        .with_state(state)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn user_json() -> Value {
    json!({
        "id": "admin-1",
        "email": "admin@lifeline.example",
        "name": "Admin",
        "role": "admin",
    })
}

async fn refresh(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<Value>) {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let hold = state.refresh_hold_ms.load(Ordering::SeqCst);
    if hold > 0 {
        tokio::time::sleep(Duration::from_millis(hold)).await;
    }

    let mode = *state.refresh_mode.lock().unwrap();
    match mode {
        RefreshMode::Succeed => {
            let token = state.mint_token("refreshed");
            (StatusCode::OK, Json(json!({ "accessToken": token })))
        }
        RefreshMode::Deny => (
            StatusCode::FORBIDDEN,
            Json(json!({ "message": "Refresh token invalid" })),
        ),
        RefreshMode::Malformed => (StatusCode::OK, Json(json!({ "message": "ok" }))),
        RefreshMode::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Refresh token expired" })),
        ),
    }
}

async fn login(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if body["password"] == CORRECT_PASSWORD {
        let token = state.mint_token("login");
        (
            StatusCode::OK,
            Json(json!({ "accessToken": token, "user": user_json() })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid credentials" })),
        )
    }
}

async fn logout(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<Value>) {
    if state.fail_logout.load(Ordering::SeqCst) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "boom" })),
        )
    } else {
        (StatusCode::OK, Json(json!({ "message": "Logged out" })))
    }
}

async fn me(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if state.authorize("/auth/me", &headers) {
        (StatusCode::OK, Json(json!({ "user": user_json() })))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthorized" })),
        )
    }
}

async fn server_error() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "boom" })),
    )
}

async fn delete_resource(
    State(state): State<Arc<ApiState>>,
    uri: Uri,
    headers: HeaderMap,
) -> StatusCode {
    if state.authorize(uri.path(), &headers) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn resource(
    State(state): State<Arc<ApiState>>,
    uri: Uri,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if state.resource_always_401.load(Ordering::SeqCst) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthorized" })),
        );
    }
    if state.authorize(uri.path(), &headers) {
        (StatusCode::OK, Json(json!({ "ok": true, "path": uri.path() })))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthorized" })),
        )
    }
}
