use vitrine_cache::{ConfigError, StorageError};
use vitrine_worker::WorkerError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
