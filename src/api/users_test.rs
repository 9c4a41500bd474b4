use serde_json::json;

use super::*;
use crate::model::Session;
use crate::storage::MemoryStorage;
use crate::test_helpers::{MockBackend, alice, client_for, tab};

fn form() -> UserForm {
    UserForm {
        username: "bob".into(),
        password: "pw1234".into(),
        name: "Bob".into(),
        role: "entry".into(),
        status: true,
        usability: None,
    }
}

fn authed_client(backend: &MockBackend) -> ApiClient {
    let store = tab(&MemoryStorage::new());
    store.write_session(&Session::authenticated("abc123", alice()));
    client_for(backend, store)
}

// =============================================================================
// validation
// =============================================================================

#[test]
fn validation_names_first_missing_field() {
    let mut f = form();
    f.username = "  ".into();
    assert_eq!(f.validate(FormMode::Create).unwrap_err().to_string(), "Username is required");

    let mut f = form();
    f.name.clear();
    assert_eq!(f.validate(FormMode::Update).unwrap_err().to_string(), "Name is required");

    let mut f = form();
    f.role.clear();
    assert_eq!(f.validate(FormMode::Update).unwrap_err().to_string(), "Role is required");
}

#[test]
fn password_only_required_on_create() {
    let mut f = form();
    f.password.clear();
    assert_eq!(
        f.validate(FormMode::Create).unwrap_err().to_string(),
        "Password is required for new users"
    );
    assert!(f.validate(FormMode::Update).is_ok());
}

// =============================================================================
// list / get
// =============================================================================

#[tokio::test]
async fn list_users_normalizes_backend_casing() {
    let backend =
        MockBackend::start(|_| (200, json!({ "users": [{ "username": "bob", "Status": "Active", "Role": "entry" }] })))
            .await;
    let client = authed_client(&backend);

    let users = list_users(&client).await.unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].username, "bob");
    assert!(users[0].status);
    assert_eq!(users[0].role, "entry");
    assert_eq!(users[0].usability, "usable");
    let req = &backend.requests()[0];
    assert_eq!(req.action(), LIST_ACTION);
    assert_eq!(req.token(), Some("abc123"));
}

#[tokio::test]
async fn list_users_without_array_is_empty() {
    let backend = MockBackend::start(|_| (200, json!({ "users": "nope" }))).await;
    let client = authed_client(&backend);
    assert!(list_users(&client).await.unwrap().is_empty());
}

#[tokio::test]
async fn get_user_accepts_each_response_shape() {
    let shapes = [
        json!({ "users": [{ "username": "bob", "Role": "entry" }] }),
        json!({ "user": { "username": "bob", "Role": "entry" } }),
        json!({ "username": "bob", "Role": "entry" }),
    ];
    for shape in shapes {
        let body = shape.clone();
        let backend = MockBackend::start(move |_| (200, body.clone())).await;
        let client = authed_client(&backend);

        let user = get_user(&client, "bob").await.unwrap().unwrap();
        assert_eq!(user.username, "bob", "{shape}");
        assert_eq!(user.role, "entry", "{shape}");
        assert_eq!(backend.requests()[0].query.get("username").map(String::as_str), Some("bob"));
    }
}

#[tokio::test]
async fn get_user_with_empty_list_is_none() {
    let backend = MockBackend::start(|_| (200, json!({ "users": [] }))).await;
    let client = authed_client(&backend);
    assert!(get_user(&client, "ghost").await.unwrap().is_none());
}

// =============================================================================
// mutations
// =============================================================================

#[tokio::test]
async fn create_sends_flat_payload() {
    let backend = MockBackend::standard().await;
    let client = authed_client(&backend);

    create_user(&client, &form()).await.unwrap();

    let body = &backend.requests()[0].body;
    assert_eq!(body["action"], CREATE_ACTION);
    assert_eq!(body["token"], "abc123");
    assert_eq!(body["username"], "bob");
    assert_eq!(body["password"], "pw1234");
    assert_eq!(body["role"], "entry");
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn invalid_form_sends_nothing() {
    let backend = MockBackend::standard().await;
    let client = authed_client(&backend);
    let mut f = form();
    f.role.clear();

    let err = create_user(&client, &f).await.unwrap_err();

    assert!(matches!(err, PortalError::Validation(_)));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn update_nests_capitalized_changes() {
    let backend = MockBackend::standard().await;
    let client = authed_client(&backend);
    let mut f = form();
    f.password.clear();
    f.status = false;
    f.usability = Some("blocked".into());

    update_user(&client, &f).await.unwrap();

    let body = &backend.requests()[0].body;
    assert_eq!(body["action"], UPDATE_ACTION);
    assert_eq!(body["username"], "bob");
    assert_eq!(body["updates"]["Name"], "Bob");
    assert_eq!(body["updates"]["Role"], "entry");
    assert_eq!(body["updates"]["Status"], "inactive");
    assert_eq!(body["updates"]["Usability"], "blocked");
    assert!(body["updates"].get("Password").is_none());
}

#[tokio::test]
async fn toggle_flips_status_only() {
    let backend = MockBackend::standard().await;
    let client = authed_client(&backend);
    let user = UserRecord::from_value(&json!({ "username": "bob", "role": "entry", "status": "active" }));

    toggle_status(&client, &user).await.unwrap();

    let body = &backend.requests()[0].body;
    assert_eq!(body["updates"]["Status"], "inactive");
    assert_eq!(body["updates"]["Role"], "entry");
}

#[tokio::test]
async fn soft_delete_posts_username() {
    let backend = MockBackend::standard().await;
    let client = authed_client(&backend);

    soft_delete_user(&client, "bob").await.unwrap();

    let body = &backend.requests()[0].body;
    assert_eq!(body["action"], DELETE_ACTION);
    assert_eq!(body["username"], "bob");
    assert_eq!(body["token"], "abc123");
}

#[tokio::test]
async fn failed_mutation_propagates() {
    let backend = MockBackend::start(|_| (500, json!({ "error": "sheet locked" }))).await;
    let client = authed_client(&backend);

    let err = soft_delete_user(&client, "bob").await.unwrap_err();
    assert!(matches!(err, PortalError::Status { status: 500, .. }));
}
