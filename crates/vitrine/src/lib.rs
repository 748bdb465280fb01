//! Vitrine
//!
//! Client-side image caching and progressive delivery.
//!
//! # Example
//! ```rust,ignore
//! use std::sync::Arc;
//! use vitrine::{AssetPipeline, Config};
//!
//! let pipeline = AssetPipeline::new(Arc::new(HttpFetcher::new()?), storage, Config::default())?;
//! pipeline.start().await?;
//! let id = pipeline.scheduler().observe(ImageElement::new("/assets/images/1.jpg"));
//! ```

mod config;
mod error;
pub mod logging;
mod pipeline;

pub use config::Config;
pub use error::Error;
pub use pipeline::{AssetPipeline, ClearSummary, ProxyFetcher};

// Re-export sub-crates for advanced usage
pub use vitrine_cache as cache;
pub use vitrine_loader as loader;
pub use vitrine_net as net;
pub use vitrine_render as render;
pub use vitrine_worker as worker;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
