//! Logging bootstrap

use tracing_subscriber::{EnvFilter, fmt};

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`, or `info` when
/// unset. Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    init_with_default("info")
}

/// Like [`init`] with a different fallback directive
pub fn init_with_default(directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
