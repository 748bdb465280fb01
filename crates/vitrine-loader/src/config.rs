//! Loader configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vitrine_cache::ConfigError;

/// Scheduling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Elements loaded per idle batch and by the critical preload
    pub preload_count: usize,
    /// Margin around the viewport in which elements become eligible (px)
    pub root_margin: f32,
    /// Minimum intersection ratio with the expanded viewport
    pub threshold: f32,
    /// Distance ahead of the scroll direction to preload (px)
    pub look_ahead: f32,
    /// Quiet time after the last scroll event before predicting (ms)
    pub scroll_settle_ms: u64,
    /// Pause between idle batches (ms)
    pub idle_delay_ms: u64,
    pub enable_lazy_loading: bool,
    pub enable_preloading: bool,
    pub enable_progressive: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            preload_count: 6,
            root_margin: 200.0,
            threshold: 0.1,
            look_ahead: 500.0,
            scroll_settle_ms: 100,
            idle_delay_ms: 2000,
            enable_lazy_loading: true,
            enable_preloading: true,
            enable_progressive: true,
        }
    }
}

impl LoaderConfig {
    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preload_count == 0 {
            return Err(ConfigError::new("preload_count", "must be positive"));
        }
        if !(self.root_margin >= 0.0) {
            return Err(ConfigError::new("root_margin", "must not be negative"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::new("threshold", "must be within 0..=1"));
        }
        if !(self.look_ahead >= 0.0) {
            return Err(ConfigError::new("look_ahead", "must not be negative"));
        }
        Ok(())
    }
}

/// Placeholder-to-image transition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Blur applied while the placeholder shows (px)
    pub blur_radius: f32,
    /// Scale applied while the placeholder shows
    pub placeholder_scale: f32,
    /// Length of the blur/scale transition (ms)
    pub duration_ms: u64,
    /// Delay between the source swap and blur removal (ms)
    pub reveal_delay_ms: u64,
    /// Length of the opacity fade for lazy loads (ms)
    pub fade_ms: u64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            blur_radius: 10.0,
            placeholder_scale: 1.05,
            duration_ms: 600,
            reveal_delay_ms: 100,
            fade_ms: 400,
        }
    }
}

impl TransitionConfig {
    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.blur_radius >= 0.0) {
            return Err(ConfigError::new("blur_radius", "must not be negative"));
        }
        if !(self.placeholder_scale > 0.0) {
            return Err(ConfigError::new("placeholder_scale", "must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        assert!(LoaderConfig::default().validate().is_ok());
        assert!(TransitionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let config = LoaderConfig { threshold: 1.5, ..Default::default() };
        assert_eq!(config.validate().unwrap_err().field, "threshold");
    }

    #[test]
    fn test_nan_margin_rejected() {
        let config = LoaderConfig { root_margin: f32::NAN, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config: LoaderConfig = serde_json::from_str(r#"{"preload_count": 3}"#).unwrap();
        assert_eq!(config.preload_count, 3);
        assert_eq!(config.root_margin, 200.0);
        assert_eq!(config.scroll_settle(), Duration::from_millis(100));
    }
}
