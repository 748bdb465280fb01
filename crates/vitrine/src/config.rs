//! Aggregate configuration

use serde::{Deserialize, Serialize};
use vitrine_cache::ConfigError;
use vitrine_loader::{LoaderConfig, TransitionConfig};
use vitrine_render::{PlaceholderConfig, ThumbnailConfig};
use vitrine_worker::ProxyConfig;

use crate::Error;

/// Settings for every component. Sections missing from JSON keep their
/// defaults, as do missing fields within a section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub loader: LoaderConfig,
    pub transition: TransitionConfig,
    pub placeholder: PlaceholderConfig,
    pub thumbnail: ThumbnailConfig,
    pub proxy: ProxyConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.loader.validate()?;
        self.transition.validate()?;
        self.placeholder.validate()?;
        self.thumbnail.validate()?;
        self.proxy.validate()?;
        Ok(())
    }

    /// Parse and validate
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
