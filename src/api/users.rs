//! Users resource: list, get, create, update, soft delete.
//!
//! Each call is one round trip with no caching. Responses go through
//! `UserRecord::from_value`, so callers only ever see the canonical shape
//! regardless of how the backend cased its fields.

use serde_json::{Map, Value, json};
use tracing::debug;

use super::client::{ApiClient, ApiRequest};
use crate::error::PortalError;
use crate::model::{UserRecord, status_label};

pub const LIST_ACTION: &str = "users/list";
pub const GET_ACTION: &str = "users/get";
pub const CREATE_ACTION: &str = "users/create";
pub const UPDATE_ACTION: &str = "users/update";
pub const DELETE_ACTION: &str = "users/delete";

// =============================================================================
// FORM
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Update,
}

/// Editable user fields as entered in the admin form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserForm {
    pub username: String,
    /// Empty means "leave unchanged" on update.
    pub password: String,
    pub name: String,
    pub role: String,
    pub status: bool,
    pub usability: Option<String>,
}

impl UserForm {
    /// Prefill an edit form from an existing record. Password starts empty.
    #[must_use]
    pub fn from_record(user: &UserRecord) -> Self {
        Self {
            username: user.username.clone(),
            password: String::new(),
            name: user.name.clone(),
            role: user.role.clone(),
            status: user.status,
            usability: None,
        }
    }

    /// # Errors
    ///
    /// `Validation` naming the first missing field.
    pub fn validate(&self, mode: FormMode) -> Result<(), PortalError> {
        if self.username.trim().is_empty() {
            return Err(PortalError::validation("Username is required"));
        }
        if self.name.trim().is_empty() {
            return Err(PortalError::validation("Name is required"));
        }
        if self.role.trim().is_empty() {
            return Err(PortalError::validation("Role is required"));
        }
        if mode == FormMode::Create && self.password.is_empty() {
            return Err(PortalError::validation("Password is required for new users"));
        }
        Ok(())
    }

    fn create_payload(&self, token: Option<String>) -> Value {
        let mut body = Map::new();
        body.insert("token".into(), token.map_or(Value::Null, Value::String));
        body.insert("username".into(), json!(self.username));
        if !self.password.is_empty() {
            body.insert("password".into(), json!(self.password));
        }
        body.insert("name".into(), json!(self.name));
        body.insert("role".into(), json!(self.role));
        body.insert("status".into(), json!(status_label(self.status)));
        Value::Object(body)
    }

    fn update_payload(&self, token: Option<String>) -> Value {
        let mut updates = Map::new();
        updates.insert("Name".into(), json!(self.name));
        updates.insert("Role".into(), json!(self.role));
        updates.insert("Status".into(), json!(status_label(self.status)));
        if !self.password.is_empty() {
            updates.insert("Password".into(), json!(self.password));
        }
        if let Some(usability) = self.usability.as_deref().filter(|u| !u.is_empty()) {
            updates.insert("Usability".into(), json!(usability));
        }
        json!({
            "token": token,
            "username": self.username,
            "updates": updates,
        })
    }
}

// =============================================================================
// CALLS
// =============================================================================

/// All users. A response without a `users` array yields an empty list.
///
/// # Errors
///
/// Transport or HTTP errors from the client.
pub async fn list_users(api: &ApiClient) -> Result<Vec<UserRecord>, PortalError> {
    let data = api.send(ApiRequest::get(LIST_ACTION)).await?;
    let users: Vec<UserRecord> = data
        .get("users")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(UserRecord::from_value).collect())
        .unwrap_or_default();
    debug!(count = users.len(), "users listed");
    Ok(users)
}

/// One user. Accepts `{users:[..]}`, `{user:{..}}` or a bare object.
///
/// # Errors
///
/// Transport or HTTP errors from the client.
pub async fn get_user(api: &ApiClient, username: &str) -> Result<Option<UserRecord>, PortalError> {
    let data = api
        .send(ApiRequest::get(GET_ACTION).param("username", username))
        .await?;
    let record = match data.get("users") {
        Some(Value::Array(arr)) => arr.first(),
        _ => data.get("user").or(Some(&data)),
    };
    Ok(record
        .filter(|v| v.is_object())
        .map(UserRecord::from_value))
}

/// Validate `form` for creation and send it.
///
/// # Errors
///
/// `Validation` for a missing username, name, role or password (nothing is
/// sent), otherwise any transport or HTTP error from the client.
pub async fn create_user(api: &ApiClient, form: &UserForm) -> Result<Value, PortalError> {
    form.validate(FormMode::Create)?;
    let body = form.create_payload(api.store().token());
    let data = api.send(ApiRequest::post(CREATE_ACTION, body)).await?;
    debug!(username = %form.username, "user created");
    Ok(data)
}

/// The username is the key and cannot be changed.
///
/// # Errors
///
/// `Validation` for a missing username, name or role (nothing is sent),
/// otherwise any transport or HTTP error from the client.
pub async fn update_user(api: &ApiClient, form: &UserForm) -> Result<Value, PortalError> {
    form.validate(FormMode::Update)?;
    send_update(api, form).await
}

/// Flip a user's active flag, keeping everything else. Only the username
/// is checked, since listed records may carry an empty name.
///
/// # Errors
///
/// `Validation` for an empty username, otherwise client errors.
pub async fn toggle_status(api: &ApiClient, user: &UserRecord) -> Result<Value, PortalError> {
    if user.username.trim().is_empty() {
        return Err(PortalError::validation("Username is required"));
    }
    let mut form = UserForm::from_record(user);
    form.status = !user.status;
    send_update(api, &form).await
}

async fn send_update(api: &ApiClient, form: &UserForm) -> Result<Value, PortalError> {
    let body = form.update_payload(api.store().token());
    let data = api.send(ApiRequest::post(UPDATE_ACTION, body)).await?;
    debug!(username = %form.username, "user updated");
    Ok(data)
}

/// Mark a user deleted on the backend.
///
/// # Errors
///
/// `Validation` for an empty username, otherwise client errors.
pub async fn soft_delete_user(api: &ApiClient, username: &str) -> Result<Value, PortalError> {
    if username.trim().is_empty() {
        return Err(PortalError::validation("Username is required"));
    }
    let body = json!({ "token": api.store().token(), "username": username });
    let data = api.send(ApiRequest::post(DELETE_ACTION, body)).await?;
    debug!(username, "user deleted");
    Ok(data)
}

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;
