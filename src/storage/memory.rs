//! In-memory origin storage shared by several tab handles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use uuid::Uuid;

use super::{EVENT_CAPACITY, KeyValueStore, StorageEvent, StorageSubscription};

/// The storage area shared by every tab of one origin.
#[derive(Clone)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
    events: broadcast::Sender<StorageEvent>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { entries: Arc::new(Mutex::new(HashMap::new())), events }
    }

    /// Open a new handle with its own origin id.
    #[must_use]
    pub fn open_tab(&self) -> MemoryStore {
        MemoryStore { storage: self.clone(), origin: Uuid::new_v4() }
    }

    fn write(&self, origin: Uuid, key: &str, new_value: Option<&str>) {
        let old_value = {
            let mut entries = self
                .entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let old = entries.get(key).cloned();
            if old.as_deref() == new_value {
                return;
            }
            match new_value {
                Some(v) => entries.insert(key.to_owned(), v.to_owned()),
                None => entries.remove(key),
            };
            old
        };
        // No subscribers is fine.
        let _ = self.events.send(StorageEvent {
            key: key.to_owned(),
            old_value,
            new_value: new_value.map(ToOwned::to_owned),
            origin,
        });
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// One tab's view of a [`MemoryStorage`].
#[derive(Clone)]
pub struct MemoryStore {
    storage: MemoryStorage,
    origin: Uuid,
}

impl MemoryStore {
    #[must_use]
    pub fn origin(&self) -> Uuid {
        self.origin
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.storage.write(self.origin, key, Some(value));
    }

    fn remove(&self, key: &str) {
        self.storage.write(self.origin, key, None);
    }

    fn subscribe(&self) -> StorageSubscription {
        StorageSubscription::new(self.storage.events.subscribe(), self.origin)
    }
}
