//! Storage bridge: mirrors the session into two durable keys and carries the
//! one-shot logout broadcast.
//!
//! Reads never fail. Anything missing, the literal strings `"undefined"` /
//! `"null"`, or unparsable user JSON degrades to an anonymous session.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::debug;

use super::{KeyValueStore, StorageSubscription};
use crate::events::LogoutEvent;
use crate::model::{Session, UserRecord};

pub const TOKEN_KEY: &str = "authToken";
pub const USER_KEY: &str = "authUser";
pub const AUTH_EVENT_KEY: &str = "auth-event";

#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Stored token, or `None` for missing/placeholder values.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.kv.get(TOKEN_KEY).filter(|t| is_present(t))
    }

    #[must_use]
    pub fn read_session(&self) -> Session {
        let Some(token) = self.token() else {
            return Session::Anonymous;
        };
        match self.read_user() {
            Some(user) => Session::Authenticated { token, user },
            None => {
                debug!("stored token has no readable user; treating session as anonymous");
                Session::Anonymous
            }
        }
    }

    pub fn write_session(&self, session: &Session) {
        match session {
            Session::Anonymous => self.clear(),
            Session::Authenticated { token, user } => {
                self.kv.set(TOKEN_KEY, token);
                match serde_json::to_string(user) {
                    Ok(json) => self.kv.set(USER_KEY, &json),
                    // UserRecord is plain strings and a bool.
                    Err(_) => self.kv.remove(USER_KEY),
                }
            }
        }
    }

    pub fn clear(&self) {
        self.kv.remove(TOKEN_KEY);
        self.kv.remove(USER_KEY);
    }

    /// Write a fresh logout marker so other handles log out too.
    pub fn broadcast_logout(&self) {
        let event = LogoutEvent::new(now_ms());
        if let Ok(json) = serde_json::to_string(&event) {
            self.kv.set(AUTH_EVENT_KEY, &json);
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> StorageSubscription {
        self.kv.subscribe()
    }

    fn read_user(&self) -> Option<UserRecord> {
        let raw = self.kv.get(USER_KEY).filter(|u| is_present(u))?;
        let value: Value = serde_json::from_str(&raw).ok()?;
        value.is_object().then(|| UserRecord::from_value(&value))
    }
}

fn is_present(raw: &str) -> bool {
    !raw.is_empty() && raw != "undefined" && raw != "null"
}

pub(crate) fn now_ms() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "bridge_test.rs"]
mod tests;
