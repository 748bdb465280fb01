//! Thumbnail and compression pipeline
//!
//! Derives reduced renditions of a source image: decode, fit into the
//! requested box, resample with Lanczos3, then encode in the first format that
//! works (WebP, AVIF, JPEG). Results are persisted through a
//! [`ThumbnailStore`] keyed by source, box and quality, so asking again for
//! the same rendition never re-encodes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::DynamicImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use smol::Timer;
use vitrine_cache::{AssetFormat, ConfigError, KeyValueStore, ThumbnailRecord, ThumbnailStats, ThumbnailStore};
use vitrine_net::{Fetcher, NetError};

use crate::data_uri::DataUri;
use crate::decoder::{ImageDecoder, ImageError};
use crate::encode::{EncodeError, FormatSupport, encode_first};

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Thumbnail pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    /// Quality for next-generation formats, `0.0..=1.0`
    pub thumbnail_quality: f32,
    /// Quality of the JPEG fallback
    pub compressed_quality: f32,
    pub enable_webp: bool,
    pub enable_avif: bool,
    pub storage_prefix: String,
    pub cache_expiry_ms: u64,
    pub batch_size: usize,
    pub batch_pause_ms: u64,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            thumbnail_width: 200,
            thumbnail_height: 200,
            thumbnail_quality: 0.7,
            compressed_quality: 0.8,
            enable_webp: true,
            enable_avif: true,
            storage_prefix: "events_thumb_".to_string(),
            cache_expiry_ms: 7 * DAY_MS,
            batch_size: 5,
            batch_pause_ms: 100,
        }
    }
}

impl ThumbnailConfig {
    pub fn cache_expiry(&self) -> Duration {
        Duration::from_millis(self.cache_expiry_ms)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn default_options(&self) -> ThumbnailOptions {
        ThumbnailOptions {
            width: self.thumbnail_width,
            height: self.thumbnail_height,
            quality: self.thumbnail_quality,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnail_width == 0 || self.thumbnail_height == 0 {
            return Err(ConfigError::new("thumbnail_width", "thumbnail box must be non-empty"));
        }
        for (field, q) in [
            ("thumbnail_quality", self.thumbnail_quality),
            ("compressed_quality", self.compressed_quality),
        ] {
            if !(q > 0.0 && q <= 1.0) {
                return Err(ConfigError::new(field, "must be within (0, 1]"));
            }
        }
        if self.storage_prefix.is_empty() {
            return Err(ConfigError::new("storage_prefix", "must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::new("batch_size", "must be positive"));
        }
        Ok(())
    }
}

/// Requested rendition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailOptions {
    pub width: u32,
    pub height: u32,
    pub quality: f32,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        ThumbnailConfig::default().default_options()
    }
}

/// Where the source image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    /// Bytes already in memory, identified by file name
    File { name: String, bytes: Arc<Vec<u8>> },
}

impl ImageSource {
    pub fn file(name: &str, bytes: Vec<u8>) -> Self {
        Self::File { name: name.to_string(), bytes: Arc::new(bytes) }
    }

    /// Identity used in the cache key
    pub fn identity(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::File { name, .. } => name,
        }
    }
}

impl From<&str> for ImageSource {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identity())
    }
}

/// Generated or cached rendition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub key: String,
    pub uri: DataUri,
    pub format: AssetFormat,
    pub extension: String,
    /// Encoded size in bytes
    pub size: usize,
}

impl Thumbnail {
    fn from_record(key: &str, record: ThumbnailRecord) -> Option<Self> {
        let uri = DataUri::parse(&record.url)?;
        Some(Self {
            key: key.to_string(),
            uri,
            format: record.format,
            extension: record.extension,
            size: record.size,
        })
    }

    fn to_record(&self) -> ThumbnailRecord {
        ThumbnailRecord {
            url: self.uri.as_str().to_string(),
            format: self.format,
            extension: self.extension.clone(),
            size: self.size,
        }
    }

    /// Encoded image bytes
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.uri.decode()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ThumbnailError {
    #[error("failed to fetch source: {0}")]
    Fetch(#[from] NetError),

    #[error("failed to decode source: {0}")]
    Decode(#[from] ImageError),

    #[error("failed to encode thumbnail: {0}")]
    Encode(#[from] EncodeError),

    #[error("requested thumbnail has no pixels")]
    EmptyImage,
}

/// One entry of a multi-size request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedSize {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl NamedSize {
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        Self { name: name.to_string(), width, height }
    }

    /// small 100, medium 200, large 400
    pub fn defaults() -> Vec<Self> {
        vec![Self::new("small", 100, 100), Self::new("medium", 200, 200), Self::new("large", 400, 400)]
    }
}

/// Outcome for one input of a batch
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub source: ImageSource,
    pub result: Result<Thumbnail, ThumbnailError>,
}

impl BatchItem {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Output size for `source` fitted into `width`×`height`
fn fit(source: (u32, u32), width: u32, height: u32) -> (u32, u32) {
    let aspect = source.0 as f64 / source.1 as f64;
    let (w, h) = if aspect > 1.0 {
        (width as f64, width as f64 / aspect)
    } else {
        (height as f64 * aspect, height as f64)
    };
    ((w as u32).max(1), (h as u32).max(1))
}

pub struct ThumbnailGenerator {
    fetcher: Arc<dyn Fetcher>,
    store: ThumbnailStore,
    config: ThumbnailConfig,
    support: FormatSupport,
    encodes: AtomicUsize,
}

impl ThumbnailGenerator {
    /// Create a generator persisting into `storage`. Previously stored
    /// thumbnails are indexed and expired ones removed.
    pub fn new(fetcher: Arc<dyn Fetcher>, storage: Arc<dyn KeyValueStore>, config: ThumbnailConfig) -> Self {
        Self::with_format_support(fetcher, storage, config, FormatSupport::detect())
    }

    pub fn with_format_support(
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn KeyValueStore>,
        config: ThumbnailConfig,
        support: FormatSupport,
    ) -> Self {
        let store = ThumbnailStore::new(storage, &config.storage_prefix, config.cache_expiry());
        let loaded = store.load();
        let swept = store.sweep_expired();
        tracing::debug!("thumbnail cache ready: {} loaded, {} expired", loaded, swept);

        Self {
            fetcher,
            store,
            config,
            support,
            encodes: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    pub fn format_support(&self) -> FormatSupport {
        self.support
    }

    /// Number of encodes performed since construction
    pub fn encode_count(&self) -> usize {
        self.encodes.load(Ordering::Relaxed)
    }

    /// Produce the rendition of `source` described by `options`
    pub async fn generate(&self, source: &ImageSource, options: ThumbnailOptions) -> Result<Thumbnail, ThumbnailError> {
        let key = self
            .store
            .cache_key(source.identity(), options.width, options.height, options.quality);

        if let Some(record) = self.store.get(&key) {
            match Thumbnail::from_record(&key, record) {
                Some(thumbnail) => {
                    tracing::debug!("thumbnail cache hit for {}", source);
                    return Ok(thumbnail);
                }
                None => tracing::warn!("discarding unreadable thumbnail entry {}", key),
            }
        }

        if options.width == 0 || options.height == 0 {
            return Err(ThumbnailError::EmptyImage);
        }

        let bytes = match source {
            ImageSource::Url(url) => self.fetcher.get(url).await?.error_for_status()?.body,
            ImageSource::File { bytes, .. } => Arc::clone(bytes),
        };
        let img = smol::unblock(move || ImageDecoder::decode(&bytes)).await?;

        let candidates = self.candidates(options.quality);
        let encoded = smol::unblock(move || {
            let (w, h) = fit((img.width(), img.height()), options.width, options.height);
            let resized: DynamicImage = img.resize_exact(w, h, FilterType::Lanczos3);
            encode_first(&resized, &candidates)
        })
        .await?;
        self.encodes.fetch_add(1, Ordering::Relaxed);

        let thumbnail = Thumbnail {
            key: key.clone(),
            uri: encoded.to_data_uri(),
            format: encoded.format,
            extension: encoded.format.extension().to_string(),
            size: encoded.data.len(),
        };
        self.store.put(&key, thumbnail.to_record());

        tracing::debug!("generated {} thumbnail for {} ({} bytes)", thumbnail.format.mime_type(), source, thumbnail.size);
        Ok(thumbnail)
    }

    /// One rendition per named size; failures are reported per size
    pub async fn generate_multiple(
        &self,
        source: &ImageSource,
        sizes: &[NamedSize],
    ) -> Vec<(String, Result<Thumbnail, ThumbnailError>)> {
        let defaults;
        let sizes = if sizes.is_empty() {
            defaults = NamedSize::defaults();
            &defaults
        } else {
            sizes
        };

        let mut out = Vec::with_capacity(sizes.len());
        for size in sizes {
            let options = ThumbnailOptions {
                width: size.width,
                height: size.height,
                quality: self.config.thumbnail_quality,
            };
            let result = self.generate(source, options).await;
            if let Err(e) = &result {
                tracing::warn!("failed to generate {} thumbnail for {}: {}", size.name, source, e);
            }
            out.push((size.name.clone(), result));
        }
        out
    }

    /// Process `sources` in groups of `batch_size`, pausing between groups.
    /// Items are returned in input order.
    pub async fn batch_process(&self, sources: Vec<ImageSource>, options: ThumbnailOptions) -> Vec<BatchItem> {
        let batch_size = self.config.batch_size.max(1);
        let groups: Vec<&[ImageSource]> = sources.chunks(batch_size).collect();
        let mut items = Vec::with_capacity(sources.len());

        for (i, group) in groups.iter().enumerate() {
            let results = futures::future::join_all(group.iter().map(|source| self.generate(source, options))).await;
            items.extend(
                group
                    .iter()
                    .cloned()
                    .zip(results)
                    .map(|(source, result)| BatchItem { source, result }),
            );

            if i + 1 < groups.len() {
                Timer::after(self.config.batch_pause()).await;
            }
        }

        items
    }

    pub fn clear_cache(&self) -> usize {
        self.store.clear()
    }

    pub fn cache_stats(&self) -> ThumbnailStats {
        self.store.stats()
    }

    fn candidates(&self, quality: f32) -> Vec<(AssetFormat, f32)> {
        let mut formats = Vec::with_capacity(3);
        if self.support.webp && self.config.enable_webp {
            formats.push((AssetFormat::Webp, quality));
        }
        if self.support.avif && self.config.enable_avif {
            formats.push((AssetFormat::Avif, quality));
        }
        formats.push((AssetFormat::Jpeg, self.config.compressed_quality));
        formats
    }
}
