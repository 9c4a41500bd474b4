//! Login, logout and token-status calls.
//!
//! The backend's login response is not rigidly typed, so
//! `normalize_login_response` resolves it with a fixed precedence order:
//!
//! - success: `success == true`, `ok == true`, `status == 200`, `status == "ok"`
//! - token: `token`, `Token`, `authToken`, `AuthToken` (non-empty strings)
//! - user: `user`, `User` (objects), else `{ username }` from a top-level
//!   `username` string
//!
//! A login only counts when all three are present.

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use super::client::{ApiClient, ApiRequest, LOGIN_ACTION};
use crate::error::PortalError;
use crate::model::{UserRecord, token_preview};

pub const STATUS_ACTION: &str = "auth/status";
pub const LOGOUT_ACTION: &str = "auth/logout";

const SUCCESS_FLAGS: [&str; 2] = ["success", "ok"];
const TOKEN_FIELDS: [&str; 4] = ["token", "Token", "authToken", "AuthToken"];
const USER_FIELDS: [&str; 2] = ["user", "User"];
const DENIAL_FLAGS: [&str; 4] = ["success", "ok", "valid", "authenticated"];

/// What a login response claimed, before deciding whether it is usable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginOutcome {
    pub success: bool,
    pub token: Option<String>,
    pub user: Option<UserRecord>,
}

impl LoginOutcome {
    /// Token and user, only when the response also signalled success.
    #[must_use]
    pub fn into_credentials(self) -> Option<(String, UserRecord)> {
        match self {
            Self { success: true, token: Some(token), user: Some(user) } => Some((token, user)),
            _ => None,
        }
    }
}

#[must_use]
pub fn normalize_login_response(data: &Value) -> LoginOutcome {
    let Some(obj) = data.as_object() else {
        return LoginOutcome::default();
    };

    let status_ok = match obj.get("status") {
        Some(Value::Number(n)) => n.as_u64() == Some(200),
        Some(Value::String(s)) => s == "ok",
        _ => false,
    };
    let success = status_ok
        || SUCCESS_FLAGS
            .iter()
            .any(|k| obj.get(*k) == Some(&Value::Bool(true)));

    let token = TOKEN_FIELDS
        .iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|t| !t.is_empty())
        .map(ToOwned::to_owned);

    let user = USER_FIELDS
        .iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| v.is_object())
        .map(UserRecord::from_value)
        .or_else(|| {
            obj.get("username")
                .and_then(Value::as_str)
                .map(|username| UserRecord::from_value(&json!({ "username": username })))
        });

    LoginOutcome { success, token, user }
}

/// Submit credentials and return the resulting token and user.
///
/// # Errors
///
/// Transport/HTTP failures from the client, or `InvalidLoginResponse`
/// when the response lacks a success marker, token or user.
pub async fn login(api: &ApiClient, username: &str, password: &str) -> Result<(String, UserRecord), PortalError> {
    debug!(username, password = %mask_password(password), "login request");
    let body = json!({ "username": username, "password": password });
    let response = api.send(ApiRequest::post(LOGIN_ACTION, body)).await?;

    let outcome = normalize_login_response(&response);
    let (success, has_token, has_user) = (outcome.success, outcome.token.is_some(), outcome.user.is_some());
    let Some((token, user)) = outcome.into_credentials() else {
        warn!(success, has_token, has_user, "invalid login response");
        return Err(PortalError::InvalidLoginResponse);
    };

    info!(username = %user.username, token = %token_preview(&token), "login accepted");
    Ok((token, user))
}

/// Best-effort server-side logout. Failures are logged, never returned.
pub async fn logout_server(api: &ApiClient) {
    match api.send(ApiRequest::post(LOGOUT_ACTION, Value::Object(Map::new()))).await {
        Ok(_) => debug!("server logout acknowledged"),
        Err(e) => warn!(error = %e, "server logout failed"),
    }
}

/// Ask the backend whether the held token is still accepted.
///
/// Fails closed: any error or falsy body counts as invalid.
pub async fn validate_token(api: &ApiClient) -> bool {
    match api.send(ApiRequest::get(STATUS_ACTION)).await {
        Ok(body) => {
            let valid = status_is_valid(&body);
            debug!(valid, "token status checked");
            valid
        }
        Err(e) => {
            warn!(error = %e, "token status check failed");
            false
        }
    }
}

/// Truthiness of a status response. `null`, `false`, `0`, `""`, `[]`, `{}`
/// and objects with an explicit `false` success/validity flag are invalid.
#[must_use]
pub fn status_is_valid(body: &Value) -> bool {
    match body {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(obj) => {
            !obj.is_empty()
                && !DENIAL_FLAGS
                    .iter()
                    .any(|k| obj.get(*k) == Some(&Value::Bool(false)))
        }
    }
}

/// `***` plus the last two characters, for request logs.
#[must_use]
pub fn mask_password(password: &str) -> String {
    if password.is_empty() {
        return String::new();
    }
    let tail: String = password
        .chars()
        .rev()
        .take(2)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("***{tail}")
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
