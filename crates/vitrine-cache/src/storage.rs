//! Key/value storage
//!
//! String-keyed durable storage in the shape of `localStorage`. Backends use
//! interior mutability so one store can be shared behind an `Arc`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::StorageError;

/// Durable string storage
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Keys starting with `prefix`
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self.keys()?.into_iter().filter(|k| k.starts_with(prefix)).collect())
    }
}

/// In-memory storage with an optional byte quota
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<BTreeMap<String, String>>,
    quota: Option<usize>,
    disabled: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit total key+value bytes to `quota`
    pub fn with_quota(quota: usize) -> Self {
        Self { quota: Some(quota), ..Self::default() }
    }

    /// Storage that rejects every operation, like a browser with storage off
    pub fn disabled() -> Self {
        Self { disabled: true, ..Self::default() }
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.disabled { Err(StorageError::Unavailable) } else { Ok(()) }
    }
}

fn used_bytes(data: &BTreeMap<String, String>) -> usize {
    data.iter().map(|(k, v)| k.len() + v.len()).sum()
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        Ok(self.data.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        let mut data = self.data.lock();

        if let Some(quota) = self.quota {
            let existing = data.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
            let available = quota.saturating_sub(used_bytes(&data) - existing);
            let needed = key.len() + value.len();
            if needed > available {
                return Err(StorageError::QuotaExceeded { needed, available });
            }
        }

        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.data.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.check()?;
        Ok(self.data.lock().keys().cloned().collect())
    }
}

/// Storage persisted as a JSON object on disk, rewritten on every change.
/// Memory only changes once the write has succeeded.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    data: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open `path`, loading existing contents. A corrupt file is discarded.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("discarding unreadable storage file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, data: Mutex::new(data) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let contents = serde_json::to_string(data)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl KeyValueStore for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut data = self.data.lock();
        let mut staged = data.clone();
        staged.insert(key.to_string(), value.to_string());
        self.persist(&staged)?;
        *data = staged;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut data = self.data.lock();
        if !data.contains_key(key) {
            return Ok(());
        }
        let mut staged = data.clone();
        staged.remove(key);
        self.persist(&staged)?;
        *data = staged;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.data.lock().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_basic() {
        let storage = MemoryStorage::new();
        storage.set_item("a", "1").unwrap();
        storage.set_item("pre_b", "2").unwrap();

        assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("1"));
        assert_eq!(storage.keys_with_prefix("pre_").unwrap(), vec!["pre_b".to_string()]);

        storage.remove_item("a").unwrap();
        assert_eq!(storage.get_item("a").unwrap(), None);
    }

    #[test]
    fn test_memory_storage_quota() {
        let storage = MemoryStorage::with_quota(10);
        storage.set_item("k", "12345").unwrap();

        let err = storage.set_item("other", "123456789").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));

        // Overwriting the same key reuses its space
        storage.set_item("k", "123456789").unwrap();
    }

    #[test]
    fn test_disabled_storage() {
        let storage = MemoryStorage::disabled();
        assert!(matches!(storage.set_item("a", "b"), Err(StorageError::Unavailable)));
        assert!(matches!(storage.keys(), Err(StorageError::Unavailable)));
    }

    #[test]
    fn test_file_storage_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        {
            let storage = FileStorage::open(&path).unwrap();
            storage.set_item("thumb", "{\"x\":1}").unwrap();
        }

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get_item("thumb").unwrap().as_deref(), Some("{\"x\":1}"));
    }

    #[test]
    fn test_file_storage_failed_write_keeps_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("storage.json");

        let storage = FileStorage::open(&path).unwrap();
        assert!(matches!(storage.set_item("a", "1"), Err(StorageError::Io(_))));
        assert_eq!(storage.get_item("a").unwrap(), None);
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_file_storage_failed_remove_keeps_item() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let storage = FileStorage::open(&path).unwrap();
        storage.set_item("a", "1").unwrap();

        // A directory in place of the file makes every write fail
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(storage.remove_item("a").is_err());
        assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_file_storage_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        let storage = FileStorage::open(&path).unwrap();
        assert!(storage.keys().unwrap().is_empty());
    }
}
