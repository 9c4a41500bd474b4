//! JSON-file storage backend for the CLI.
//!
//! The file holds one flat JSON object of string values. Reads always go
//! to disk so that writes from other processes are visible; a corrupt or
//! missing file reads as empty. Writes are best-effort: failures are logged
//! and swallowed, the same contract browser storage gives the bridge.
//!
//! Other processes cannot push events to us, so `poll_external_changes`
//! diffs the file against the last snapshot this handle saw and publishes
//! the difference with a nil origin.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use super::{EVENT_CAPACITY, KeyValueStore, StorageEvent, StorageSubscription};

type Entries = BTreeMap<String, String>;

pub struct FileStore {
    path: PathBuf,
    origin: Uuid,
    snapshot: Mutex<Entries>,
    events: broadcast::Sender<StorageEvent>,
}

impl FileStore {
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let snapshot = read_entries(&path);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { path, origin: Uuid::new_v4(), snapshot: Mutex::new(snapshot), events }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Publish events for keys changed on disk since the last snapshot.
    /// Returns the number of changed keys.
    pub fn poll_external_changes(&self) -> usize {
        let current = read_entries(&self.path);
        let previous = {
            let mut snapshot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *snapshot, current.clone())
        };

        let keys: BTreeSet<&String> = previous.keys().chain(current.keys()).collect();
        let mut changed = 0;
        for key in keys {
            let old_value = previous.get(key);
            let new_value = current.get(key);
            if old_value == new_value {
                continue;
            }
            changed += 1;
            let _ = self.events.send(StorageEvent {
                key: key.clone(),
                old_value: old_value.cloned(),
                new_value: new_value.cloned(),
                origin: Uuid::nil(),
            });
        }
        changed
    }

    fn write(&self, key: &str, new_value: Option<&str>) {
        let mut entries = read_entries(&self.path);
        let old_value = entries.get(key).cloned();
        if old_value.as_deref() == new_value {
            return;
        }
        match new_value {
            Some(v) => entries.insert(key.to_owned(), v.to_owned()),
            None => entries.remove(key),
        };

        if let Err(e) = write_entries(&self.path, &entries) {
            warn!(error = %e, path = %self.path.display(), key, "storage write failed");
            return;
        }
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = entries;

        let _ = self.events.send(StorageEvent {
            key: key.to_owned(),
            old_value,
            new_value: new_value.map(ToOwned::to_owned),
            origin: self.origin,
        });
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        read_entries(&self.path).remove(key)
    }

    fn set(&self, key: &str, value: &str) {
        self.write(key, Some(value));
    }

    fn remove(&self, key: &str) {
        self.write(key, None);
    }

    fn subscribe(&self) -> StorageSubscription {
        StorageSubscription::new(self.events.subscribe(), self.origin)
    }
}

fn read_entries(path: &Path) -> Entries {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return Entries::new();
    };
    match serde_json::from_str::<Entries>(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "ignoring unreadable storage file");
            Entries::new()
        }
    }
}

fn write_entries(path: &Path, entries: &Entries) -> std::io::Result<()> {
    if entries.is_empty() {
        return match std::fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        };
    }
    let rendered = serde_json::to_string_pretty(entries).map_err(std::io::Error::other)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, rendered)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
#[path = "file_test.rs"]
mod tests;
