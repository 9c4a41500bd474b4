use serde_json::json;

use super::*;
use crate::model::Session;
use crate::storage::MemoryStorage;
use crate::storage::bridge::{AUTH_EVENT_KEY, TOKEN_KEY};
use crate::test_helpers::{MockBackend, alice, client_for, tab};

// =============================================================================
// request shaping
// =============================================================================

#[tokio::test]
async fn login_carries_api_key_and_never_token() {
    let backend = MockBackend::standard().await;
    let store = tab(&MemoryStorage::new());
    store.write_session(&Session::authenticated("stale", alice()));
    let client = client_for(&backend, store);

    client
        .send(ApiRequest::post("login", json!({ "username": "alice", "password": "secret1" })))
        .await
        .unwrap();

    let req = &backend.requests()[0];
    assert_eq!(req.method, axum::http::Method::POST);
    assert_eq!(req.action(), "login");
    assert_eq!(req.body["action"], "login");
    assert_eq!(req.body["apiKey"], "test-key");
    assert_eq!(req.token(), None);
}

#[tokio::test]
async fn explicit_api_key_is_not_overwritten() {
    let backend = MockBackend::standard().await;
    let client = client_for(&backend, tab(&MemoryStorage::new()));

    client
        .send(ApiRequest::post("login", json!({ "apiKey": "mine" })))
        .await
        .unwrap();

    assert_eq!(backend.requests()[0].body["apiKey"], "mine");
}

#[tokio::test]
async fn non_login_requests_carry_stored_token() {
    let backend = MockBackend::standard().await;
    let store = tab(&MemoryStorage::new());
    store.write_session(&Session::authenticated("abc123", alice()));
    let client = client_for(&backend, store);

    client
        .send(ApiRequest::get("users/get").param("username", "bob"))
        .await
        .unwrap();

    let req = &backend.requests()[0];
    assert_eq!(req.method, axum::http::Method::GET);
    assert_eq!(req.action(), "users/get");
    assert_eq!(req.token(), Some("abc123"));
    assert_eq!(req.query.get("username").map(String::as_str), Some("bob"));
    assert!(req.body.get("apiKey").is_none());
}

#[tokio::test]
async fn anonymous_requests_are_sent_without_token() {
    let backend = MockBackend::standard().await;
    let client = client_for(&backend, tab(&MemoryStorage::new()));

    client.send(ApiRequest::get("users/list")).await.unwrap();

    assert_eq!(backend.requests()[0].token(), None);
}

#[tokio::test]
async fn post_mirrors_action_into_body() {
    let backend = MockBackend::standard().await;
    let client = client_for(&backend, tab(&MemoryStorage::new()));

    client
        .send(ApiRequest::post("users/delete", json!({ "username": "bob" })))
        .await
        .unwrap();

    let req = &backend.requests()[0];
    assert_eq!(req.action(), "users/delete");
    assert_eq!(req.body["action"], "users/delete");
    assert_eq!(req.body["username"], "bob");
}

// =============================================================================
// response handling
// =============================================================================

#[tokio::test]
async fn unauthorized_broadcasts_logout_to_other_tabs() {
    let backend = MockBackend::start(|_| (401, json!({ "error": "expired" }))).await;
    let storage = MemoryStorage::new();
    let this_tab = tab(&storage);
    let other_tab = tab(&storage);
    let mut other_events = other_tab.subscribe();
    let client = client_for(&backend, this_tab);

    let err = client.send(ApiRequest::get("users/list")).await.unwrap_err();

    assert!(matches!(err, PortalError::Unauthorized));
    let event = other_events.try_recv().expect("logout marker should be written");
    assert_eq!(event.key, AUTH_EVENT_KEY);
    assert!(event.new_value.unwrap().contains("\"logout\""));
}

#[tokio::test]
async fn unauthorized_clears_stored_session_before_marker() {
    let backend = MockBackend::start(|_| (401, json!({}))).await;
    let storage = MemoryStorage::new();
    let this_tab = tab(&storage);
    this_tab.write_session(&Session::authenticated("abc123", alice()));
    let other_tab = tab(&storage);
    let mut other_events = other_tab.subscribe();
    let client = client_for(&backend, this_tab);

    let _ = client.send(ApiRequest::get("users/list")).await;

    assert_eq!(other_tab.read_session(), Session::Anonymous);
    let keys: Vec<String> = std::iter::from_fn(|| other_events.try_recv()).map(|e| e.key).collect();
    assert_eq!(keys.last().map(String::as_str), Some(AUTH_EVENT_KEY));
    assert!(keys.iter().any(|k| k == TOKEN_KEY));
}

#[tokio::test]
async fn other_failures_surface_status() {
    let backend = MockBackend::start(|_| (500, json!({ "error": "boom" }))).await;
    let client = client_for(&backend, tab(&MemoryStorage::new()));

    let err = client.send(ApiRequest::get("users/list")).await.unwrap_err();

    match err {
        PortalError::Status { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("boom"));
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let config = crate::test_helpers::config_for("http://127.0.0.1:1/exec");
    let client = ApiClient::new(&config, tab(&MemoryStorage::new())).unwrap();

    let err = client.send(ApiRequest::get("auth/status")).await.unwrap_err();
    assert!(matches!(err, PortalError::Transport(_)));
}

// =============================================================================
// decode_body
// =============================================================================

#[test]
fn decode_body_handles_empty_json_and_text() {
    assert_eq!(decode_body(""), Value::Null);
    assert_eq!(decode_body("  \n"), Value::Null);
    assert_eq!(decode_body(r#"{"ok":true}"#), json!({ "ok": true }));
    assert_eq!(decode_body("OK"), Value::String("OK".into()));
}

#[test]
fn login_detection_reads_action_or_body() {
    assert!(ApiRequest::post("login", json!({})).is_login());
    assert!(ApiRequest::post("", json!({ "action": "login" })).is_login());
    assert!(!ApiRequest::get("auth/status").is_login());
}
