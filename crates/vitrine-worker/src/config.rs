//! Proxy configuration

use serde::{Deserialize, Serialize};
use url::Url;
use vitrine_cache::ConfigError;

use crate::manifest::{self, GALLERY_IMAGES, STATIC_ASSETS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Origin relative paths resolve against
    pub origin: String,
    pub cache_prefix: String,
    pub cache_version: String,
    pub static_assets: Vec<String>,
    pub gallery_images: Vec<String>,
    /// Navigation fallbacks, tried in order
    pub root_documents: Vec<String>,
    pub app_name: String,
    pub galleries_page: String,
    pub notification_icon: String,
    pub sync_tag: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost/".to_string(),
            cache_prefix: "events-studio".to_string(),
            cache_version: "v1".to_string(),
            static_assets: manifest::owned(STATIC_ASSETS),
            gallery_images: manifest::owned(GALLERY_IMAGES),
            root_documents: vec!["/index.html".to_string(), "/".to_string()],
            app_name: "Events Studio".to_string(),
            galleries_page: "/galleries.html".to_string(),
            notification_icon: "/assets/favicon/favicon-96x96.png".to_string(),
            sync_tag: "gallery-sync".to_string(),
        }
    }
}

impl ProxyConfig {
    pub fn static_cache(&self) -> String {
        format!("{}-static-{}", self.cache_prefix, self.cache_version)
    }

    pub fn image_cache(&self) -> String {
        format!("{}-images-{}", self.cache_prefix, self.cache_version)
    }

    /// Cache for navigations
    pub fn gallery_cache(&self) -> String {
        format!("{}-gallery-{}", self.cache_prefix, self.cache_version)
    }

    /// Names `activate` keeps
    pub fn current_caches(&self) -> [String; 3] {
        [self.static_cache(), self.image_cache(), self.gallery_cache()]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = Url::parse(&self.origin).map_err(|e| ConfigError::new("origin", e.to_string()))?;
        if origin.cannot_be_a_base() {
            return Err(ConfigError::new("origin", "must be a base URL"));
        }
        if self.cache_prefix.trim().is_empty() {
            return Err(ConfigError::new("cache_prefix", "must not be empty"));
        }
        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::new("cache_version", "must not be empty"));
        }
        if !self.galleries_page.starts_with('/') {
            return Err(ConfigError::new("galleries_page", "must be an absolute path"));
        }
        Ok(())
    }
}
