//! Session and user record types.
//!
//! DESIGN
//! ======
//! `Session` is either fully anonymous or fully authenticated. A token
//! without a resolved user cannot be represented, so consumers never have to
//! guess whether a half-populated session counts as logged in.
//!
//! The backend's user shape is loosely typed (`status` vs `Status`, string
//! enums for booleans). `UserRecord::from_value` is the one place that
//! translation happens.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_USABILITY: &str = "usable";

// =============================================================================
// USER RECORD
// =============================================================================

/// Canonical view model of a backend user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub name: String,
    pub role: String,
    /// `true` when the backend status string is `"active"`.
    pub status: bool,
    pub usability: String,
}

impl UserRecord {
    /// Normalize an arbitrary backend object into a `UserRecord`.
    ///
    /// Field precedence: lowercase key first, then the capitalized variant.
    /// Missing strings become `""`, missing usability becomes `"usable"`.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let empty = Map::new();
        let obj = value.as_object().unwrap_or(&empty);
        Self {
            username: pick_str(obj, &["username", "Username"]).unwrap_or_default(),
            name: pick_str(obj, &["name", "Name"]).unwrap_or_default(),
            role: pick_str(obj, &["role", "Role"]).unwrap_or_default(),
            status: pick(obj, &["status", "Status"]).is_some_and(status_is_active),
            usability: pick_str(obj, &["usability", "Usability"])
                .unwrap_or_else(|| DEFAULT_USABILITY.to_owned()),
        }
    }

    /// Backend wire value for `status`.
    #[must_use]
    pub fn status_label(&self) -> &'static str {
        status_label(self.status)
    }
}

#[must_use]
pub fn status_label(active: bool) -> &'static str {
    if active { "active" } else { "inactive" }
}

fn pick<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn pick_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    pick(obj, keys).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn status_is_active(value: &Value) -> bool {
    match value {
        Value::String(s) => s.trim().eq_ignore_ascii_case("active"),
        Value::Bool(b) => *b,
        _ => false,
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// The in-memory authentication state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated { token: String, user: UserRecord },
}

impl Session {
    #[must_use]
    pub fn authenticated(token: impl Into<String>, user: UserRecord) -> Self {
        Self::Authenticated { token: token.into(), user }
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { token, .. } => Some(token),
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserRecord> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { user, .. } => Some(user),
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }
}

/// Shortened token for log output.
#[must_use]
pub fn token_preview(token: &str) -> String {
    let head: String = token.chars().take(6).collect();
    format!("{head}…")
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
