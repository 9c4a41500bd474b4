//! Cross-tab auth signals decoded from storage events.
//!
//! Storage is the only channel shared by every open client, so it doubles
//! as a publish/subscribe bus: the logout path publishes a marker under the
//! `auth-event` key and every other handle decodes it here. Direct changes
//! to the token/user keys (another tab logging in) surface as
//! `SessionChanged`.

use serde::{Deserialize, Serialize};

use crate::storage::StorageEvent;
use crate::storage::bridge::{AUTH_EVENT_KEY, TOKEN_KEY, USER_KEY};

/// Wire shape of the `auth-event` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub ts: i64,
}

impl LogoutEvent {
    pub const KIND: &'static str = "logout";

    #[must_use]
    pub fn new(ts: i64) -> Self {
        Self { kind: Self::KIND.to_owned(), ts }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSignal {
    /// Another client logged out or hit a 401.
    Logout { ts: i64 },
    /// Another client rewrote the stored token or user.
    SessionChanged,
}

/// Map a storage mutation to the auth signal it carries, if any.
#[must_use]
pub fn classify(event: &StorageEvent) -> Option<AuthSignal> {
    match event.key.as_str() {
        AUTH_EVENT_KEY => {
            let raw = event.new_value.as_deref()?;
            let marker: LogoutEvent = serde_json::from_str(raw).ok()?;
            (marker.kind == LogoutEvent::KIND).then_some(AuthSignal::Logout { ts: marker.ts })
        }
        TOKEN_KEY | USER_KEY => Some(AuthSignal::SessionChanged),
        _ => None,
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
