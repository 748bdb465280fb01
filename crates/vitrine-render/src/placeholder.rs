//! Placeholder generation
//!
//! Produces a cheap stand-in for an image whose full bytes are not available
//! yet. The source is fetched at most once, bounded by the configured timeout,
//! and shared by the strategies, which are tried in order:
//!
//! 1. low-quality raster: the source shrunk to a tiny JPEG
//! 2. dominant colour: a gradient from the average colour to a lighter shade
//! 3. skeleton: an SVG with a neutral gradient and a `Loading...` label
//!
//! [`PlaceholderGenerator::generate`] never fails. Whatever goes wrong with the
//! source, the caller gets the skeleton at worst.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use image::imageops::FilterType;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smol::Timer;
use vitrine_cache::{AssetFormat, ConfigError};
use vitrine_net::Fetcher;

use crate::color::{Rgb, dominant_color, render_gradient};
use crate::data_uri::DataUri;
use crate::decoder::ImageDecoder;
use crate::encode::encode;
use crate::svg::skeleton_svg;

/// Placeholder generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderConfig {
    pub enable_low_quality: bool,
    pub enable_dominant_color: bool,
    /// JPEG quality of the low-quality raster, in percent
    pub placeholder_quality: u8,
    /// Width of the low-quality raster in pixels
    pub lqip_width: u32,
    /// Edge of the square the source is shrunk to before averaging
    pub color_sample_size: u32,
    /// Edge of the rendered colour gradient
    pub gradient_size: u32,
    /// Lightening applied to the second gradient stop
    pub lighten_percent: f32,
    /// Budget for fetching and decoding the source
    pub timeout_ms: u64,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            enable_low_quality: true,
            enable_dominant_color: true,
            placeholder_quality: 20,
            lqip_width: 40,
            color_sample_size: 50,
            gradient_size: 200,
            lighten_percent: 20.0,
            timeout_ms: 3000,
        }
    }
}

impl PlaceholderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.placeholder_quality) {
            return Err(ConfigError::new("placeholder_quality", "must be within 1..=100"));
        }
        if self.lqip_width == 0 {
            return Err(ConfigError::new("lqip_width", "must be positive"));
        }
        if self.color_sample_size == 0 {
            return Err(ConfigError::new("color_sample_size", "must be positive"));
        }
        if self.gradient_size == 0 {
            return Err(ConfigError::new("gradient_size", "must be positive"));
        }
        if !(0.0..=100.0).contains(&self.lighten_percent) {
            return Err(ConfigError::new("lighten_percent", "must be within 0..=100"));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::new("timeout_ms", "must be positive"));
        }
        Ok(())
    }
}

/// Which strategy produced a placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    LowQuality,
    DominantColor,
    Skeleton,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    pub uri: DataUri,
}

impl Placeholder {
    /// Skeleton sized to the given layout hints
    pub fn skeleton(width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            kind: PlaceholderKind::Skeleton,
            uri: DataUri::from_bytes(AssetFormat::Svg.mime_type(), skeleton_svg(width, height).as_bytes()),
        }
    }
}

/// Run `fut`, giving up after `limit`
async fn within<T>(limit: Duration, fut: impl Future<Output = Option<T>>) -> Option<T> {
    smol::future::or(fut, async {
        Timer::after(limit).await;
        None
    })
    .await
}

pub struct PlaceholderGenerator {
    fetcher: Arc<dyn Fetcher>,
    config: PlaceholderConfig,
    colors: Mutex<HashMap<String, Rgb>>,
}

impl PlaceholderGenerator {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: PlaceholderConfig) -> Self {
        Self {
            fetcher,
            config,
            colors: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &PlaceholderConfig {
        &self.config
    }

    /// Produce a placeholder for `src`; `width`/`height` are layout hints
    pub async fn generate(&self, src: &str, width: Option<u32>, height: Option<u32>) -> Placeholder {
        // Outer None: not fetched yet. Inner None: fetched, unusable.
        let mut source: Option<Option<Arc<DynamicImage>>> = None;

        if self.config.enable_low_quality {
            let img = within(self.config.timeout(), self.load(src)).await;
            match &img {
                Some(img) => {
                    if let Some(uri) = self.low_quality(img) {
                        return Placeholder { kind: PlaceholderKind::LowQuality, uri };
                    }
                }
                None => tracing::debug!("low-quality placeholder unavailable for {}", src),
            }
            source = Some(img);
        }

        if self.config.enable_dominant_color {
            let color = match source {
                Some(img) => self.color_of(src, img.as_deref()),
                None => self.color_for(src, None).await,
            };
            let light = color.lighten(self.config.lighten_percent);
            if let Some(png) = render_gradient(color, light, self.config.gradient_size) {
                return Placeholder {
                    kind: PlaceholderKind::DominantColor,
                    uri: DataUri::from_bytes("image/png", &png),
                };
            }
            tracing::warn!("colour placeholder rendering failed for {}", src);
        }

        Placeholder::skeleton(width, height)
    }

    /// Average colour of `src`, memoised per source. Falls back to
    /// [`Rgb::NEUTRAL`] without caching when the source cannot be read.
    pub async fn color_for(&self, src: &str, decoded: Option<Arc<DynamicImage>>) -> Rgb {
        if let Some(color) = self.colors.lock().get(src).copied() {
            return color;
        }

        let img = match decoded {
            Some(img) => Some(img),
            None => within(self.config.timeout(), self.load(src)).await,
        };
        self.color_of(src, img.as_deref())
    }

    /// Average colour of an already loaded source
    fn color_of(&self, src: &str, img: Option<&DynamicImage>) -> Rgb {
        if let Some(color) = self.colors.lock().get(src).copied() {
            return color;
        }
        let Some(img) = img else {
            tracing::debug!("colour extraction failed for {}, using neutral", src);
            return Rgb::NEUTRAL;
        };

        let color = dominant_color(img, self.config.color_sample_size);
        self.colors.lock().insert(src.to_string(), color);
        color
    }

    /// Number of memoised dominant colours
    pub fn cached_colors(&self) -> usize {
        self.colors.lock().len()
    }

    pub fn clear_colors(&self) {
        self.colors.lock().clear();
    }

    async fn load(&self, src: &str) -> Option<Arc<DynamicImage>> {
        let response = match self.fetcher.get(src).await.and_then(|r| r.error_for_status()) {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("placeholder fetch failed for {}: {}", src, e);
                return None;
            }
        };

        let body = response.body;
        match smol::unblock(move || ImageDecoder::decode(&body)).await {
            Ok(img) => Some(Arc::new(img)),
            Err(e) => {
                tracing::debug!("placeholder decode failed for {}: {}", src, e);
                None
            }
        }
    }

    fn low_quality(&self, img: &DynamicImage) -> Option<DataUri> {
        let width = self.config.lqip_width;
        let height = ((img.height() as f64 / img.width() as f64) * width as f64).round().max(1.0) as u32;
        let small = img.resize_exact(width, height, FilterType::Nearest);

        let quality = self.config.placeholder_quality as f32 / 100.0;
        match encode(&small, AssetFormat::Jpeg, quality) {
            Ok(jpeg) => Some(DataUri::from_bytes(AssetFormat::Jpeg.mime_type(), &jpeg)),
            Err(e) => {
                tracing::warn!("low-quality placeholder encode failed: {}", e);
                None
            }
        }
    }
}
