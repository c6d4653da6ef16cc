use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::io::storage::{DurableStore, StorageEvent, Subscription};

/// Read `key` from the store, falling back on any failure.
///
/// A missing key yields `fallback` silently; an unreadable store or an
/// unparseable value yields `fallback` and is logged.
pub fn read_value<T, S>(store: &S, key: &str, fallback: T) -> T
where
    T: DeserializeOwned,
    S: DurableStore + ?Sized,
{
    match store.get_item(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key, "could not parse stored value: {}", e);
                fallback
            }
        },
        Ok(None) => fallback,
        Err(e) => {
            tracing::error!(key, "could not read stored value: {}", e);
            fallback
        }
    }
}

/// Lifecycle of a cell's in-memory value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellPhase<T> {
    /// Not yet read from the store; holds the fallback or an optimistic write
    Uninitialized(T),
    /// Read from the store; writes are persisted
    Hydrated(T),
}

impl<T> CellPhase<T> {
    fn value(&self) -> &T {
        match self {
            CellPhase::Uninitialized(v) | CellPhase::Hydrated(v) => v,
        }
    }

    fn value_mut(&mut self) -> &mut T {
        match self {
            CellPhase::Uninitialized(v) | CellPhase::Hydrated(v) => v,
        }
    }
}

/// A typed value mirrored to one key of a durable store.
///
/// Starts at `fallback` so the first observation never depends on the
/// store. `hydrate()` loads the stored value once; afterwards `set()`
/// writes through. Changes made to the same key by other contexts are
/// picked up by `sync_external()`.
///
/// None of the methods return errors: store failures are logged and the
/// in-memory value stays authoritative for the session.
pub struct PersistentCell<T, S> {
    store: S,
    key: String,
    fallback: T,
    phase: CellPhase<T>,
    subscription: Option<Subscription>,
}

impl<T, S> PersistentCell<T, S>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq,
    S: DurableStore,
{
    /// Create an unhydrated cell and subscribe to cross-context changes.
    pub fn new(store: S, key: impl Into<String>, fallback: T) -> Self {
        let key = key.into();
        let subscription = match store.subscribe() {
            Ok(sub) => Some(sub),
            Err(e) => {
                tracing::warn!(key = %key, "cross-context updates disabled: {}", e);
                None
            }
        };
        PersistentCell {
            store,
            key,
            phase: CellPhase::Uninitialized(fallback.clone()),
            fallback,
            subscription,
        }
    }

    pub fn get(&self) -> &T {
        self.phase.value()
    }

    pub fn phase(&self) -> &CellPhase<T> {
        &self.phase
    }

    pub fn is_hydrated(&self) -> bool {
        matches!(self.phase, CellPhase::Hydrated(_))
    }

    /// Load the stored value. Runs once; later calls do nothing.
    ///
    /// Change events queued so far are dropped: the stored value read here
    /// already includes them. The in-memory value is replaced only when the
    /// stored value differs from the fallback. Returns whether the
    /// observable value changed.
    pub fn hydrate(&mut self) -> bool {
        let current = match &self.phase {
            CellPhase::Hydrated(_) => return false,
            CellPhase::Uninitialized(v) => v.clone(),
        };

        if let Some(sub) = &self.subscription {
            let dropped = sub.poll().len();
            if dropped > 0 {
                tracing::debug!(key = %self.key, dropped, "change events before hydration dropped");
            }
        }

        let stored = read_value(&self.store, &self.key, self.fallback.clone());
        let next = if stored != self.fallback { stored } else { current };
        let changed = next != *self.get();
        tracing::debug!(key = %self.key, changed, "hydrated");
        self.phase = CellPhase::Hydrated(next);
        changed
    }

    /// Replace the value.
    ///
    /// The new value is visible immediately. It is persisted only once the
    /// cell is hydrated; earlier writes are kept in memory and persisted by
    /// the next write after hydration.
    pub fn set(&mut self, value: T) {
        *self.phase.value_mut() = value;

        if !self.is_hydrated() {
            tracing::warn!(key = %self.key, "write before hydration; not persisted");
            return;
        }

        let raw = match serde_json::to_string(self.get()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(key = %self.key, "could not serialize value: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set_item(&self.key, &raw) {
            tracing::error!(key = %self.key, "could not persist value: {}", e);
        }
    }

    /// Replace the value with `f(current)`.
    pub fn update(&mut self, f: impl FnOnce(&T) -> T) {
        let next = f(self.get());
        self.set(next);
    }

    /// Apply all pending cross-context changes.
    /// Returns true if the in-memory value changed.
    pub fn sync_external(&mut self) -> bool {
        let events = match &self.subscription {
            Some(sub) => sub.poll(),
            None => return false,
        };
        let mut changed = false;
        for event in &events {
            changed |= self.apply_event(event);
        }
        changed
    }

    /// Block up to `timeout` for a cross-context change, then apply it and
    /// anything else queued. Returns true if the in-memory value changed.
    pub fn wait_external(&mut self, timeout: std::time::Duration) -> bool {
        let first = match &self.subscription {
            Some(sub) => sub.wait(timeout),
            None => {
                std::thread::sleep(timeout);
                return false;
            }
        };
        let mut changed = match first {
            Some(event) => self.apply_event(&event),
            None => false,
        };
        changed |= self.sync_external();
        changed
    }

    /// Handle one change notification.
    ///
    /// Ignored unless it is for this key and this store's area, and the
    /// cell is hydrated. A removed or unparseable value resets to the
    /// fallback. The value is only replaced when it actually differs.
    pub fn apply_event(&mut self, event: &StorageEvent) -> bool {
        if event.key != self.key || event.area != self.store.area() {
            return false;
        }
        if !self.is_hydrated() {
            tracing::debug!(key = %self.key, "change event before hydration ignored");
            return false;
        }

        let incoming = match &event.new_value {
            None => self.fallback.clone(),
            Some(raw) => match serde_json::from_str::<T>(raw) {
                Ok(value) => value,
                Err(e) => {
                    tracing::error!(key = %self.key, "could not parse changed value: {}", e);
                    self.fallback.clone()
                }
            },
        };

        if incoming == *self.get() {
            return false;
        }
        tracing::debug!(key = %self.key, "applied external change");
        self.phase = CellPhase::Hydrated(incoming);
        true
    }
}
