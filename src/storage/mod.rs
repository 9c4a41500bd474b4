//! Persistent key-value storage and the session bridge on top of it.
//!
//! DESIGN
//! ======
//! `KeyValueStore` models browser-local storage: string keys, string values,
//! synchronous best-effort writes. Every handle has an origin id; mutations
//! are published as `StorageEvent`s and a handle's subscription never sees
//! its own writes, matching how a tab only receives `storage` events caused
//! by other tabs.
//!
//! Backends:
//! - `memory`: one shared origin storage with any number of tab handles.
//! - `file`: a JSON file so CLI invocations share one session.

pub mod bridge;
pub mod file;
pub mod memory;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::warn;
use uuid::Uuid;

pub use bridge::SessionStore;
pub use file::FileStore;
pub use memory::{MemoryStorage, MemoryStore};

pub(crate) const EVENT_CAPACITY: usize = 64;

/// A single observed mutation of a storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
    /// Handle that performed the write. `Uuid::nil()` for writes observed
    /// from outside the process.
    pub origin: Uuid,
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    /// Subscribe to writes made through other handles.
    fn subscribe(&self) -> StorageSubscription;
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Receiver side of the storage event channel, filtered to foreign writes.
pub struct StorageSubscription {
    rx: broadcast::Receiver<StorageEvent>,
    own_origin: Uuid,
}

impl StorageSubscription {
    pub(crate) fn new(rx: broadcast::Receiver<StorageEvent>, own_origin: Uuid) -> Self {
        Self { rx, own_origin }
    }

    /// Wait for the next foreign write. `None` once the storage is gone.
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.origin == self.own_origin => {}
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "storage subscription lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.origin == self.own_origin => {}
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "storage subscription lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
