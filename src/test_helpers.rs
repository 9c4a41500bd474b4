//! Test fixtures: an in-process stand-in for the script backend plus
//! pre-wired storage and clients.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use crate::api::ApiClient;
use crate::config::PortalConfig;
use crate::model::UserRecord;
use crate::session::SessionManager;
use crate::storage::{KeyValueStore, MemoryStorage, SessionStore};

// =============================================================================
// MOCK BACKEND
// =============================================================================

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub query: HashMap<String, String>,
    pub body: Value,
}

impl RecordedRequest {
    pub fn action(&self) -> &str {
        self.query.get("action").map_or("", String::as_str)
    }

    pub fn token(&self) -> Option<&str> {
        self.query.get("token").map(String::as_str)
    }
}

type Responder = dyn Fn(&RecordedRequest) -> (u16, Value) + Send + Sync;

#[derive(Clone)]
struct MockState {
    responder: Arc<Responder>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct MockBackend {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    server: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start(responder: impl Fn(&RecordedRequest) -> (u16, Value) + Send + Sync + 'static) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState { responder: Arc::new(responder), requests: requests.clone() };
        let app = Router::new().fallback(handle).with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { base_url: format!("http://{addr}/exec"), requests, server }
    }

    /// Backend that logs in `alice`/`secret1`, accepts status checks and
    /// answers every other action with `{ "success": true }`.
    pub async fn standard() -> Self {
        Self::start(|req| match req.action() {
            "login" => {
                if req.body["username"] == "alice" && req.body["password"] == "secret1" {
                    (200, login_ok("abc123"))
                } else {
                    (200, json!({ "success": false, "message": "bad credentials" }))
                }
            }
            "auth/status" => (200, json!({ "success": true })),
            _ => (200, json!({ "success": true })),
        })
        .await
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.requests().iter().map(|r| r.action().to_owned()).collect()
    }

    pub fn count(&self, action: &str) -> usize {
        self.requests().iter().filter(|r| r.action() == action).count()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle(
    State(state): State<MockState>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let request = RecordedRequest { method, query, body };
    let (status, value) = (state.responder)(&request);
    state.requests.lock().unwrap().push(request);
    (StatusCode::from_u16(status).unwrap(), Json(value))
}

// =============================================================================
// FIXTURES
// =============================================================================

pub fn login_ok(token: &str) -> Value {
    json!({
        "success": true,
        "token": token,
        "user": { "username": "alice", "name": "Alice", "role": "manager", "status": "active" },
    })
}

pub fn alice() -> UserRecord {
    UserRecord::from_value(&json!({ "username": "alice", "name": "Alice", "role": "manager", "status": "active" }))
}

pub fn config_for(base_url: &str) -> PortalConfig {
    let mut config = PortalConfig::for_base_url(base_url).unwrap();
    config.api_key = Some("test-key".to_owned());
    config
}

pub fn tab(storage: &MemoryStorage) -> SessionStore {
    let kv: Arc<dyn KeyValueStore> = Arc::new(storage.open_tab());
    SessionStore::new(kv)
}

pub fn client_for(backend: &MockBackend, store: SessionStore) -> ApiClient {
    ApiClient::new(&config_for(&backend.base_url), store).unwrap()
}

/// A session manager in its own tab of `storage`.
pub fn manager_for(backend: &MockBackend, storage: &MemoryStorage) -> SessionManager {
    let store = tab(storage);
    let api = client_for(backend, store.clone());
    SessionManager::new(api, config_for(&backend.base_url).debounce)
}
