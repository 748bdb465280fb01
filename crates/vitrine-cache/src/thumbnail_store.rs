//! Persisted thumbnail store
//!
//! Thumbnails live in a [`KeyValueStore`] under a fixed key prefix, each value
//! a JSON `{data, timestamp}` document, mirrored by an in-memory index that
//! answers lookups. Storage failures never reach the caller: they are logged
//! and the store behaves as if the entry were missing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::storage::KeyValueStore;
use crate::{AssetFormat, now_millis};

/// Encoded thumbnail as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailRecord {
    /// `data:` URI with the encoded image
    pub url: String,
    pub format: AssetFormat,
    pub extension: String,
    /// Decoded payload size in bytes
    pub size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedThumbnail {
    data: ThumbnailRecord,
    timestamp: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThumbnailStats {
    pub entries: usize,
    pub total_size: usize,
    pub formats: BTreeMap<AssetFormat, usize>,
}

pub struct ThumbnailStore {
    storage: Arc<dyn KeyValueStore>,
    prefix: String,
    ttl: Duration,
    index: Mutex<HashMap<String, ThumbnailRecord>>,
}

impl ThumbnailStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, prefix: &str, ttl: Duration) -> Self {
        Self {
            storage,
            prefix: prefix.to_string(),
            ttl,
            index: Mutex::new(HashMap::new()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Storage key for a rendition of `source`
    pub fn cache_key(&self, source: &str, width: u32, height: u32, quality: f32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(format!("|{width}x{height}|q{quality:.3}").as_bytes());
        format!("{}{:x}", self.prefix, hasher.finalize())
    }

    /// Populate the index from storage, returning how many entries were read
    pub fn load(&self) -> usize {
        let keys = match self.storage.keys_with_prefix(&self.prefix) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("failed to list persisted thumbnails: {}", e);
                return 0;
            }
        };

        let mut index = self.index.lock();
        let mut loaded = 0;
        for key in keys {
            let Ok(Some(raw)) = self.storage.get_item(&key) else { continue };
            match serde_json::from_str::<PersistedThumbnail>(&raw) {
                Ok(entry) => {
                    index.insert(key, entry.data);
                    loaded += 1;
                }
                Err(e) => tracing::debug!("skipping unreadable thumbnail {}: {}", key, e),
            }
        }
        loaded
    }

    pub fn get(&self, key: &str) -> Option<ThumbnailRecord> {
        self.index.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.lock().contains_key(key)
    }

    /// Index `record` and persist it stamped with the current time
    pub fn put(&self, key: &str, record: ThumbnailRecord) {
        self.put_at(key, record, now_millis());
    }

    /// Index `record` and persist it with an explicit timestamp
    pub fn put_at(&self, key: &str, record: ThumbnailRecord, timestamp_ms: u64) {
        self.index.lock().insert(key.to_string(), record.clone());

        let persisted = PersistedThumbnail { data: record, timestamp: timestamp_ms };
        let result = serde_json::to_string(&persisted)
            .map_err(crate::StorageError::from)
            .and_then(|json| self.storage.set_item(key, &json));

        if let Err(e) = result {
            tracing::warn!("failed to persist thumbnail {}: {}", key, e);
        }
    }

    /// Delete entries older than the TTL, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(now_millis())
    }

    /// Sweep as if the current time were `now_ms`. Unreadable entries are
    /// removed as well.
    pub fn sweep_expired_at(&self, now_ms: u64) -> usize {
        let keys = match self.storage.keys_with_prefix(&self.prefix) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("thumbnail sweep skipped: {}", e);
                return 0;
            }
        };

        let ttl_ms = self.ttl.as_millis() as u64;
        let expired: Vec<String> = keys
            .into_iter()
            .filter(|key| match self.storage.get_item(key) {
                Ok(Some(raw)) => match serde_json::from_str::<PersistedThumbnail>(&raw) {
                    Ok(entry) => now_ms.saturating_sub(entry.timestamp) > ttl_ms,
                    Err(_) => true,
                },
                Ok(None) => false,
                Err(_) => false,
            })
            .collect();

        let mut index = self.index.lock();
        for key in &expired {
            if let Err(e) = self.storage.remove_item(key) {
                tracing::warn!("failed to remove expired thumbnail {}: {}", key, e);
            }
            index.remove(key);
        }

        if !expired.is_empty() {
            tracing::debug!("swept {} expired thumbnails", expired.len());
        }
        expired.len()
    }

    /// Remove every persisted thumbnail and empty the index
    pub fn clear(&self) -> usize {
        let keys = self.storage.keys_with_prefix(&self.prefix).unwrap_or_else(|e| {
            tracing::warn!("failed to list thumbnails for clear: {}", e);
            Vec::new()
        });

        for key in &keys {
            if let Err(e) = self.storage.remove_item(key) {
                tracing::warn!("failed to remove thumbnail {}: {}", key, e);
            }
        }

        let mut index = self.index.lock();
        let removed = keys.len().max(index.len());
        index.clear();
        removed
    }

    pub fn stats(&self) -> ThumbnailStats {
        let index = self.index.lock();
        let mut stats = ThumbnailStats { entries: index.len(), ..Default::default() };
        for record in index.values() {
            stats.total_size += record.size;
            *stats.formats.entry(record.format).or_insert(0) += 1;
        }
        stats
    }
}
