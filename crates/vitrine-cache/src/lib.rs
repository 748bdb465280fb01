//! Vitrine Cache
//!
//! In-memory object cache with explicit release of blob handles, key/value
//! storage backends, and the persisted thumbnail store built on top of them.

pub mod blob;
pub mod object_cache;
pub mod storage;
pub mod thumbnail_store;

pub use blob::{Blob, BlobRegistry, ObjectUrl};
pub use object_cache::{CacheEntry, ClearReport, ObjectCache, ObjectCacheStats, Representation};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage};
pub use thumbnail_store::{ThumbnailRecord, ThumbnailStats, ThumbnailStore};

use serde::{Deserialize, Serialize};

/// Encoding of a cached representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFormat {
    /// Bytes kept as fetched
    Raw,
    Webp,
    Avif,
    Jpeg,
    Svg,
}

impl AssetFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Raw => "application/octet-stream",
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
            Self::Jpeg => "image/jpeg",
            Self::Svg => "image/svg+xml",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Raw => "",
            Self::Webp => ".webp",
            Self::Avif => ".avif",
            Self::Jpeg => ".jpg",
            Self::Svg => ".svg",
        }
    }
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage quota exceeded ({needed} bytes needed, {available} available)")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("storage unavailable")]
    Unavailable,

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Rejected configuration value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid configuration `{field}`: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self { field, reason: reason.into() }
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
