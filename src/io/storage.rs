use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use crate::io::lock::LockError;

/// Error type for durable store operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("durable storage is not available")]
    Unavailable,
    #[error("invalid storage key '{0}': use letters, digits, '-' or '_'")]
    InvalidKey(String),
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("could not watch for storage changes: {0}")]
    Watch(#[from] notify::Error),
}

/// Identifies a storage area. Events from a different area are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageArea(String);

impl StorageArea {
    pub fn new(name: impl Into<String>) -> Self {
        StorageArea(name.into())
    }
}

impl fmt::Display for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key changed in another context sharing the same storage area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    /// `None` when the key was removed
    pub new_value: Option<String>,
    pub area: StorageArea,
}

/// String-keyed durable storage shared between execution contexts.
///
/// Implementations only notify subscribers about changes made by *other*
/// contexts; a context never sees its own writes as events.
pub trait DurableStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
    /// Start receiving change events. Dropping the subscription stops them.
    fn subscribe(&self) -> Result<Subscription, StorageError>;
    fn area(&self) -> StorageArea;
}

impl<S: DurableStore + ?Sized> DurableStore for Box<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }

    fn subscribe(&self) -> Result<Subscription, StorageError> {
        (**self).subscribe()
    }

    fn area(&self) -> StorageArea {
        (**self).area()
    }
}

/// Receiving end of a store's change notifications.
///
/// Holds whatever keeps the notification source alive; dropping the
/// subscription releases it.
pub struct Subscription {
    rx: Receiver<StorageEvent>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(rx: Receiver<StorageEvent>, release: impl FnOnce() + Send + 'static) -> Self {
        Subscription {
            rx,
            release: Some(Box::new(release)),
        }
    }

    /// Non-blocking poll for pending events.
    /// Returns all queued events (may be empty).
    pub fn poll(&self) -> Vec<StorageEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }

    /// Block up to `timeout` for the next event.
    pub fn wait(&self, timeout: Duration) -> Option<StorageEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

static NEXT_AREA: AtomicU64 = AtomicU64::new(1);

struct MemoryArea {
    name: StorageArea,
    items: HashMap<String, String>,
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

struct Subscriber {
    id: u64,
    context: u64,
    tx: Sender<StorageEvent>,
}

/// In-process durable store.
///
/// Every handle is its own execution context; `sibling()` opens another
/// context on the same area, the way a second tab shares `localStorage`.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Mutex<MemoryArea>>,
    context: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        let n = NEXT_AREA.fetch_add(1, Ordering::Relaxed);
        MemoryStore {
            shared: Arc::new(Mutex::new(MemoryArea {
                name: StorageArea::new(format!("memory:{}", n)),
                items: HashMap::new(),
                subscribers: Vec::new(),
                next_id: 1,
            })),
            context: 0,
        }
    }

    /// Another context sharing this store's area
    pub fn sibling(&self) -> Self {
        let mut area = self.lock();
        let context = area.next_id;
        area.next_id += 1;
        MemoryStore {
            shared: Arc::clone(&self.shared),
            context,
        }
    }

    /// Number of live subscriptions on this area
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryArea> {
        // A panic while holding the lock leaves the map itself intact
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn change(&self, key: &str, new_value: Option<String>) {
        let mut area = self.lock();
        let old_value = match &new_value {
            Some(v) => area.items.insert(key.to_string(), v.clone()),
            None => area.items.remove(key),
        };
        if old_value == new_value {
            return;
        }
        let event = StorageEvent {
            key: key.to_string(),
            old_value,
            new_value,
            area: area.name.clone(),
        };
        let context = self.context;
        area.subscribers
            .retain(|s| s.context == context || s.tx.send(event.clone()).is_ok());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.change(key, Some(value.to_string()));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.change(key, None);
        Ok(())
    }

    fn subscribe(&self) -> Result<Subscription, StorageError> {
        let (tx, rx) = mpsc::channel();
        let id = {
            let mut area = self.lock();
            let id = area.next_id;
            area.next_id += 1;
            area.subscribers.push(Subscriber {
                id,
                context: self.context,
                tx,
            });
            id
        };
        let weak: Weak<Mutex<MemoryArea>> = Arc::downgrade(&self.shared);
        Ok(Subscription::new(rx, move || {
            if let Some(shared) = weak.upgrade() {
                let mut area = shared.lock().unwrap_or_else(|e| e.into_inner());
                area.subscribers.retain(|s| s.id != id);
            }
        }))
    }

    fn area(&self) -> StorageArea {
        self.lock().name.clone()
    }
}

// ---------------------------------------------------------------------------
// Unavailable store
// ---------------------------------------------------------------------------

/// A store that refuses every operation (disabled or sandboxed storage).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStore;

impl DurableStore for UnavailableStore {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }

    fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }

    fn subscribe(&self) -> Result<Subscription, StorageError> {
        Err(StorageError::Unavailable)
    }

    fn area(&self) -> StorageArea {
        StorageArea::new("unavailable")
    }
}

/// Check that a key maps to a plain file name
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get_item("tasks").unwrap(), None);
    }

    #[test]
    fn siblings_share_items() {
        let a = MemoryStore::new();
        let b = a.sibling();
        a.set_item("tasks", "[]").unwrap();
        assert_eq!(b.get_item("tasks").unwrap().as_deref(), Some("[]"));
        assert_eq!(a.area(), b.area());
    }

    #[test]
    fn separate_stores_have_separate_areas() {
        assert_ne!(MemoryStore::new().area(), MemoryStore::new().area());
    }

    #[test]
    fn events_only_reach_other_contexts() {
        let a = MemoryStore::new();
        let b = a.sibling();
        let sub_a = a.subscribe().unwrap();
        let sub_b = b.subscribe().unwrap();

        a.set_item("tasks", "[1]").unwrap();

        assert!(sub_a.poll().is_empty());
        let events = sub_b.poll();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, "tasks");
        assert_eq!(events[0].old_value, None);
        assert_eq!(events[0].new_value.as_deref(), Some("[1]"));
        assert_eq!(events[0].area, a.area());
    }

    #[test]
    fn unchanged_write_sends_no_event() {
        let a = MemoryStore::new();
        let b = a.sibling();
        a.set_item("k", "v").unwrap();
        let sub_b = b.subscribe().unwrap();
        a.set_item("k", "v").unwrap();
        assert!(sub_b.poll().is_empty());
    }

    #[test]
    fn remove_sends_event_with_no_new_value() {
        let a = MemoryStore::new();
        let b = a.sibling();
        a.set_item("k", "v").unwrap();
        let sub_b = b.subscribe().unwrap();
        a.remove_item("k").unwrap();
        let events = sub_b.poll();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].old_value.as_deref(), Some("v"));
        assert_eq!(events[0].new_value, None);
    }

    #[test]
    fn dropping_subscription_deregisters() {
        let a = MemoryStore::new();
        let b = a.sibling();
        let sub = b.subscribe().unwrap();
        assert_eq!(a.subscriber_count(), 1);
        drop(sub);
        assert_eq!(a.subscriber_count(), 0);
    }

    #[test]
    fn unavailable_store_fails_everything() {
        let store = UnavailableStore;
        assert!(matches!(store.get_item("k"), Err(StorageError::Unavailable)));
        assert!(matches!(store.set_item("k", "v"), Err(StorageError::Unavailable)));
        assert!(store.subscribe().is_err());
    }

    #[test]
    fn key_validation() {
        assert!(validate_key("tasks").is_ok());
        assert!(validate_key("ui_theme-2").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc").is_err());
        assert!(validate_key("a b").is_err());
    }
}
