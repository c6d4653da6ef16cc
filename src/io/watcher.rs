use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::io::storage::{StorageArea, StorageEvent, Subscription, validate_key};

/// Last value this process wrote or read, per key (`None` = absent).
/// Shared between a `FileStore` and its watchers.
pub type KnownValues = Arc<Mutex<HashMap<String, Option<String>>>>;

/// File system watcher turning changes to `<key>.json` files in a data
/// directory into `StorageEvent`s.
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<StorageEvent>,
}

impl StoreWatcher {
    /// Start watching `data_dir`.
    ///
    /// Changes whose content matches `known` are this process's own writes
    /// (or already observed) and are not reported.
    pub fn start(
        data_dir: &Path,
        area: StorageArea,
        known: KnownValues,
    ) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let dir_owned = data_dir.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!("storage watcher error: {}", e);
                        return;
                    }
                };

                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }

                for path in &event.paths {
                    let Some(key) = key_for_path(&dir_owned, path) else {
                        continue;
                    };
                    let current = fs::read_to_string(path).ok();

                    let old_value = {
                        let mut known = known.lock().unwrap_or_else(|e| e.into_inner());
                        let previous = known.get(&key).cloned().flatten();
                        if known.get(&key) == Some(&current) {
                            continue;
                        }
                        known.insert(key.clone(), current.clone());
                        previous
                    };

                    tracing::debug!(key = %key, "external change detected");
                    let _ = tx.send(StorageEvent {
                        key,
                        old_value,
                        new_value: current,
                        area: area.clone(),
                    });
                }
            },
            Config::default(),
        )?;

        watcher.watch(data_dir, RecursiveMode::NonRecursive)?;
        Ok(StoreWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Hand the event stream to a `Subscription` that stops the watcher
    /// when dropped.
    pub fn into_subscription(self) -> Subscription {
        let StoreWatcher {
            _watcher: watcher,
            rx,
        } = self;
        Subscription::new(rx, move || {
            drop(watcher);
            tracing::debug!("storage watcher stopped");
        })
    }
}

/// Map `<dir>/<key>.json` to `key`; anything else (temp files, the lock
/// file, other directories) maps to `None`.
fn key_for_path(dir: &Path, path: &Path) -> Option<String> {
    if path.parent() != Some(dir) {
        return None;
    }
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    validate_key(stem).ok()?;
    Some(stem.to_string())
}

/// Path of the file holding `key`
pub fn path_for_key(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.json", key))
}
