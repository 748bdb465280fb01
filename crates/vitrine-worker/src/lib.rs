//! Vitrine Worker
//!
//! Offline cache proxy. Sits between the page and the network, answering
//! requests from named caches it alone writes to, and is driven through a
//! small JSON control channel.

pub mod cache_storage;
pub mod config;
pub mod manifest;
pub mod messages;
pub mod proxy;
pub mod push;
pub mod routing;
pub mod sync;

pub use cache_storage::{Cache, CacheStorage};
pub use config::ProxyConfig;
pub use messages::{ControlMessage, ControlReply};
pub use proxy::{InstallReport, OfflineProxy};
pub use push::{ClientAction, Notification, NotificationAction, NotificationOptions};
pub use routing::RequestClass;
pub use sync::SyncReport;

use vitrine_cache::ConfigError;

/// Worker lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// Worker errors
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("worker is {actual:?}, expected {expected:?}")]
    InvalidState { expected: WorkerState, actual: WorkerState },

    #[error("malformed control message: {0}")]
    Message(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
