//! Object cache
//!
//! Maps a resource key to the representation the page should display.
//! There is no size-bounded eviction: entries leave only through `delete`,
//! `clear` or replacement. Blob-backed entries are revoked as they leave.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::AssetFormat;
use crate::blob::{BlobRegistry, ObjectUrl};

/// What the page displays for a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Representation {
    /// Blob registered in the [`BlobRegistry`]
    Object(ObjectUrl),
    /// Self-contained `data:` URI
    DataUri(String),
}

impl Representation {
    /// Value suitable for an element's `src`
    pub fn as_src(&self) -> &str {
        match self {
            Self::Object(url) => url.as_str(),
            Self::DataUri(uri) => uri,
        }
    }

    fn object_url(&self) -> Option<&ObjectUrl> {
        match self {
            Self::Object(url) => Some(url),
            Self::DataUri(_) => None,
        }
    }
}

/// Cached representation of one resource
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub representation: Representation,
    pub size_bytes: usize,
    pub created_at: SystemTime,
    pub format: AssetFormat,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, representation: Representation, size_bytes: usize, format: AssetFormat) -> Self {
        Self {
            key: key.into(),
            representation,
            size_bytes,
            created_at: SystemTime::now(),
            format,
        }
    }
}

/// Outcome of [`ObjectCache::clear`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Blob handles revoked
    pub released: usize,
    /// Blob handles that were already gone from the registry
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectCacheStats {
    pub entries: usize,
    pub total_bytes: usize,
    pub blob_backed: usize,
}

/// Page-side object cache
#[derive(Debug)]
pub struct ObjectCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    blobs: Arc<BlobRegistry>,
}

impl ObjectCache {
    pub fn new(blobs: Arc<BlobRegistry>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            blobs,
        }
    }

    /// Registry backing the blob entries of this cache
    pub fn blobs(&self) -> &Arc<BlobRegistry> {
        &self.blobs
    }

    pub fn get(&self, key: &str) -> Option<Representation> {
        self.entries.lock().get(key).map(|e| e.representation.clone())
    }

    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Insert or replace the entry for `entry.key`
    pub fn set(&self, entry: CacheEntry) {
        let previous = self.entries.lock().insert(entry.key.clone(), entry.clone());

        if let Some(old) = previous.as_ref().and_then(|p| p.representation.object_url()) {
            if entry.representation.object_url() != Some(old) {
                self.blobs.revoke(old);
            }
        }
    }

    /// Remove `key`, revoking its blob; false if absent
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.entries.lock().remove(key);
        match removed {
            Some(entry) => {
                if let Some(url) = entry.representation.object_url() {
                    self.blobs.revoke(url);
                }
                true
            }
            None => false,
        }
    }

    /// Drop every entry, revoking every blob handle before returning
    pub fn clear(&self) -> ClearReport {
        let drained: Vec<CacheEntry> = self.entries.lock().drain().map(|(_, e)| e).collect();

        let mut report = ClearReport::default();
        for url in drained.iter().filter_map(|e| e.representation.object_url()) {
            if self.blobs.revoke(url) {
                report.released += 1;
            } else {
                report.failed += 1;
            }
        }

        if report.failed > 0 {
            tracing::warn!("object cache clear: {} blob handles were already released", report.failed);
        }
        report
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> ObjectCacheStats {
        let entries = self.entries.lock();
        ObjectCacheStats {
            entries: entries.len(),
            total_bytes: entries.values().map(|e| e.size_bytes).sum(),
            blob_backed: entries.values().filter(|e| e.representation.object_url().is_some()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ObjectCache {
        ObjectCache::new(Arc::new(BlobRegistry::new()))
    }

    fn blob_entry(cache: &ObjectCache, key: &str, bytes: Vec<u8>) -> CacheEntry {
        let size = bytes.len();
        let url = cache.blobs().create_object_url(Arc::new(bytes), "image/jpeg");
        CacheEntry::new(key, Representation::Object(url), size, AssetFormat::Jpeg)
    }

    #[test]
    fn test_set_get_has_delete() {
        let cache = cache();
        let entry = blob_entry(&cache, "https://a.test/1.jpg", vec![0; 10]);
        let url = entry.representation.clone();
        cache.set(entry);

        assert!(cache.has("https://a.test/1.jpg"));
        assert_eq!(cache.get("https://a.test/1.jpg"), Some(url));
        assert!(cache.delete("https://a.test/1.jpg"));
        assert!(!cache.delete("https://a.test/1.jpg"));
        assert_eq!(cache.blobs().live_count(), 0);
    }

    #[test]
    fn test_replace_revokes_previous_blob() {
        let cache = cache();
        cache.set(blob_entry(&cache, "k", vec![1]));
        cache.set(blob_entry(&cache, "k", vec![2, 2]));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.blobs().live_count(), 1);
        assert_eq!(cache.stats().total_bytes, 2);
    }

    #[test]
    fn test_clear_releases_all_and_is_idempotent() {
        let cache = cache();
        cache.set(blob_entry(&cache, "a", vec![1]));
        cache.set(blob_entry(&cache, "b", vec![2]));
        cache.set(CacheEntry::new("c", Representation::DataUri("data:image/svg+xml;base64,".into()), 0, AssetFormat::Svg));

        let first = cache.clear();
        assert_eq!(first, ClearReport { released: 2, failed: 0 });
        assert_eq!(cache.blobs().live_count(), 0);
        assert!(cache.is_empty());

        let second = cache.clear();
        assert_eq!(second, ClearReport::default());
    }

    #[test]
    fn test_clear_reports_already_revoked() {
        let cache = cache();
        let entry = blob_entry(&cache, "a", vec![1]);
        if let Representation::Object(url) = &entry.representation {
            cache.blobs().revoke(url);
        }
        cache.set(entry);

        assert_eq!(cache.clear(), ClearReport { released: 0, failed: 1 });
    }
}
