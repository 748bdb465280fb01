//! Blob registry
//!
//! Object URLs for fetched bytes. Every URL handed out stays alive until it is
//! revoked; the registry never releases anything on its own.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

const OBJECT_URL_PREFIX: &str = "blob:vitrine/";

/// Immutable raw binary data with a MIME type
#[derive(Debug, Clone)]
pub struct Blob {
    data: Arc<Vec<u8>>,
    mime_type: String,
}

impl Blob {
    pub fn new(data: Arc<Vec<u8>>, mime_type: &str) -> Self {
        Self { data, mime_type: mime_type.to_string() }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Handle naming a registered blob
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recognise strings produced by [`BlobRegistry::create_object_url`]
    pub fn parse(s: &str) -> Option<Self> {
        s.starts_with(OBJECT_URL_PREFIX).then(|| Self(s.to_string()))
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
pub struct BlobRegistry {
    blobs: Mutex<HashMap<ObjectUrl, Blob>>,
    next_id: AtomicU64,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register bytes and return a fresh object URL for them
    pub fn create_object_url(&self, data: Arc<Vec<u8>>, mime_type: &str) -> ObjectUrl {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let url = ObjectUrl(format!("{OBJECT_URL_PREFIX}{id}"));
        self.blobs.lock().insert(url.clone(), Blob::new(data, mime_type));
        url
    }

    pub fn resolve(&self, url: &ObjectUrl) -> Option<Blob> {
        self.blobs.lock().get(url).cloned()
    }

    /// Release the blob behind `url`; false if it was not live
    pub fn revoke(&self, url: &ObjectUrl) -> bool {
        self.blobs.lock().remove(url).is_some()
    }

    pub fn live_count(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn total_bytes(&self) -> usize {
        self.blobs.lock().values().map(Blob::size).sum()
    }
}
