//! Encoding and format negotiation
//!
//! Output formats are tried in preference order and the first encoder that
//! succeeds wins. JPEG is the mandatory fallback.

use std::io::Cursor;
use std::sync::OnceLock;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use vitrine_cache::AssetFormat;

use crate::data_uri::DataUri;

/// Encoded bytes with their format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: AssetFormat,
}

impl EncodedImage {
    pub fn to_data_uri(&self) -> DataUri {
        DataUri::from_bytes(self.format.mime_type(), &self.data)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EncodeError {
    #[error("{0:?} output is not supported")]
    Unsupported(AssetFormat),

    #[error("{format:?} encoding failed: {reason}")]
    Failed { format: AssetFormat, reason: String },

    #[error("no output format could be produced")]
    NoFormat,
}

/// Next-generation formats this build can encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSupport {
    pub webp: bool,
    pub avif: bool,
}

impl FormatSupport {
    /// Probe each encoder once with a tiny image; the result is memoised
    pub fn detect() -> Self {
        static SUPPORT: OnceLock<FormatSupport> = OnceLock::new();
        *SUPPORT.get_or_init(|| {
            let probe = DynamicImage::new_rgba8(2, 2);
            let support = Self {
                webp: encode(&probe, AssetFormat::Webp, 0.5).is_ok(),
                avif: encode(&probe, AssetFormat::Avif, 0.5).is_ok(),
            };
            tracing::debug!("encoder support: webp={} avif={}", support.webp, support.avif);
            support
        })
    }

    /// Legacy formats only
    pub fn none() -> Self {
        Self { webp: false, avif: false }
    }
}

fn quality_percent(quality: f32) -> u8 {
    (quality.clamp(0.01, 1.0) * 100.0).round() as u8
}

/// Encode `img` as `format`. WebP output is lossless, so `quality` only
/// applies to JPEG and AVIF.
pub fn encode(img: &DynamicImage, format: AssetFormat, quality: f32) -> Result<Vec<u8>, EncodeError> {
    let failed = |e: image::ImageError| EncodeError::Failed { format, reason: e.to_string() };
    let mut buf = Vec::new();

    match format {
        AssetFormat::Jpeg => {
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality_percent(quality))
                .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
                .map_err(failed)?;
        }
        AssetFormat::Webp => {
            let rgba = img.to_rgba8();
            WebPEncoder::new_lossless(&mut buf)
                .write_image(rgba.as_raw(), rgba.width(), rgba.height(), ExtendedColorType::Rgba8)
                .map_err(failed)?;
        }
        AssetFormat::Avif => {
            img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Avif)
                .map_err(failed)?;
        }
        AssetFormat::Raw | AssetFormat::Svg => return Err(EncodeError::Unsupported(format)),
    }

    Ok(buf)
}

/// Try `candidates` in order and return the first successful encoding
pub fn encode_first(img: &DynamicImage, candidates: &[(AssetFormat, f32)]) -> Result<EncodedImage, EncodeError> {
    for &(format, quality) in candidates {
        match encode(img, format, quality) {
            Ok(data) => return Ok(EncodedImage { data, format }),
            Err(e) => tracing::warn!("failed to create {} output: {}", format.mime_type(), e),
        }
    }
    Err(EncodeError::NoFormat)
}
