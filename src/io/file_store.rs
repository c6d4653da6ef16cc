use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::NamedTempFile;

use crate::io::lock::FileLock;
use crate::io::storage::{DurableStore, StorageArea, StorageError, Subscription, validate_key};
use crate::io::watcher::{KnownValues, StoreWatcher, path_for_key};

/// Durable store backed by one `<key>.json` file per key in a directory.
///
/// Each `FileStore` handle is its own execution context: another process
/// (or another handle) opened on the same directory sees this handle's
/// writes as change events, and vice versa.
pub struct FileStore {
    dir: PathBuf,
    known: KnownValues,
    lock_timeout: Duration,
}

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

impl FileStore {
    /// Open a store on an existing directory.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        Self::with_lock_timeout(dir, DEFAULT_LOCK_TIMEOUT)
    }

    /// Open a store whose writes wait at most `lock_timeout` for the
    /// directory lock.
    pub fn with_lock_timeout(dir: &Path, lock_timeout: Duration) -> Result<Self, StorageError> {
        let dir = fs::canonicalize(dir).map_err(|e| StorageError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if !dir.is_dir() {
            return Err(StorageError::Io {
                path: dir,
                source: std::io::Error::new(ErrorKind::NotADirectory, "not a directory"),
            });
        }
        Ok(FileStore {
            dir,
            known: Arc::new(Mutex::new(HashMap::new())),
            lock_timeout,
        })
    }

    fn lock(&self) -> Result<FileLock, StorageError> {
        Ok(FileLock::acquire(&self.dir, self.lock_timeout)?)
    }

    fn remember(&self, key: &str, value: Option<String>) -> Option<Option<String>> {
        let mut known = self.known.lock().unwrap_or_else(|e| e.into_inner());
        known.insert(key.to_string(), value)
    }

    fn restore(&self, key: &str, previous: Option<Option<String>>) {
        let mut known = self.known.lock().unwrap_or_else(|e| e.into_inner());
        match previous {
            Some(value) => known.insert(key.to_string(), value),
            None => known.remove(key),
        };
    }

    fn write_atomic(&self, path: &Path, value: &str) -> Result<(), StorageError> {
        let io_err = |e: std::io::Error| StorageError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(value.as_bytes()).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

impl DurableStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        let path = path_for_key(&self.dir, key);
        let value = match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(StorageError::Io { path, source: e }),
        };
        self.remember(key, value.clone());
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let path = path_for_key(&self.dir, key);
        let _lock = self.lock()?;

        // Record before writing so the watcher recognizes our own change
        let previous = self.remember(key, Some(value.to_string()));
        if let Err(e) = self.write_atomic(&path, value) {
            self.restore(key, previous);
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let path = path_for_key(&self.dir, key);
        let _lock = self.lock()?;

        let previous = self.remember(key, None);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                self.restore(key, previous);
                Err(StorageError::Io { path, source: e })
            }
        }
    }

    fn subscribe(&self) -> Result<Subscription, StorageError> {
        let watcher = StoreWatcher::start(&self.dir, self.area(), Arc::clone(&self.known))?;
        tracing::debug!(dir = %self.dir.display(), "watching for storage changes");
        Ok(watcher.into_subscription())
    }

    fn area(&self) -> StorageArea {
        StorageArea::new(self.dir.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    use crate::io::lock::LockError;
    use crate::io::storage::StorageEvent;

    /// Wait for the first event for `key`, ignoring anything else.
    fn wait_for_key(sub: &Subscription, key: &str) -> Option<StorageEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(evt) = sub.wait(Duration::from_millis(100))
                && evt.key == key
            {
                return Some(evt);
            }
        }
        None
    }

    #[test]
    fn missing_key_reads_as_none() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        assert_eq!(store.get_item("tasks").unwrap(), None);
    }

    #[test]
    fn set_then_get_across_handles() {
        let tmp = TempDir::new().unwrap();
        let a = FileStore::open(tmp.path()).unwrap();
        let b = FileStore::open(tmp.path()).unwrap();

        a.set_item("tasks", r#"[{"id":"1","text":"x","completed":false}]"#)
            .unwrap();

        assert_eq!(
            b.get_item("tasks").unwrap().as_deref(),
            Some(r#"[{"id":"1","text":"x","completed":false}]"#)
        );
        assert!(tmp.path().join("tasks.json").exists());
        assert_eq!(a.area(), b.area());
    }

    #[test]
    fn overwrite_is_last_write_wins() {
        let tmp = TempDir::new().unwrap();
        let a = FileStore::open(tmp.path()).unwrap();
        let b = FileStore::open(tmp.path()).unwrap();
        a.set_item("k", "\"one\"").unwrap();
        b.set_item("k", "\"two\"").unwrap();
        assert_eq!(a.get_item("k").unwrap().as_deref(), Some("\"two\""));
    }

    #[test]
    fn remove_missing_key_is_ok() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store.remove_item("nothing").unwrap();
        store.set_item("k", "1").unwrap();
        store.remove_item("k").unwrap();
        assert_eq!(store.get_item("k").unwrap(), None);
    }

    #[test]
    fn rejects_path_like_keys() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        assert!(matches!(
            store.set_item("../escape", "1"),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn write_gives_up_after_lock_timeout() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::with_lock_timeout(tmp.path(), Duration::from_millis(50)).unwrap();
        let _held = FileLock::acquire(tmp.path(), Duration::from_secs(1)).unwrap();

        assert!(matches!(
            store.set_item("tasks", "[]"),
            Err(StorageError::Lock(LockError::Timeout { .. }))
        ));
        assert_eq!(store.get_item("tasks").unwrap(), None);
    }

    #[test]
    fn open_missing_dir_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(FileStore::open(&tmp.path().join("nope")).is_err());
    }

    #[test]
    fn other_handle_sees_change_event() {
        let tmp = TempDir::new().unwrap();
        let writer = FileStore::open(tmp.path()).unwrap();
        let reader = FileStore::open(tmp.path()).unwrap();
        let sub = reader.subscribe().unwrap();

        writer.set_item("tasks", "[]").unwrap();

        let evt = wait_for_key(&sub, "tasks").expect("no change event");
        assert_eq!(evt.new_value.as_deref(), Some("[]"));
        assert_eq!(evt.area, reader.area());
    }

    #[test]
    fn own_writes_are_not_reported() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        let sub = store.subscribe().unwrap();

        store.set_item("tasks", "[]").unwrap();

        assert!(wait_for_key_briefly(&sub, "tasks").is_none());
    }

    fn wait_for_key_briefly(sub: &Subscription, key: &str) -> Option<StorageEvent> {
        let deadline = Instant::now() + Duration::from_millis(500);
        while Instant::now() < deadline {
            if let Some(evt) = sub.wait(Duration::from_millis(50))
                && evt.key == key
            {
                return Some(evt);
            }
        }
        None
    }
}
