//! Image decoder
//!
//! Format sniffing plus decoding through the image crate.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat as ImgFormat};

/// Source image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Avif,
    Svg,
    Unknown,
}

impl ImageFormat {
    /// Detect format from magic bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        if data.len() < 8 {
            return Self::Unknown;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Self::Png;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }

        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Self::Gif;
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Self::WebP;
        }

        // AVIF: ....ftypavif / ftypavis
        if data.len() >= 12 && &data[4..8] == b"ftyp" && (&data[8..12] == b"avif" || &data[8..12] == b"avis") {
            return Self::Avif;
        }

        let head = String::from_utf8_lossy(&data[..data.len().min(256)]);
        let head = head.trim_start();
        if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
            return Self::Svg;
        }

        Self::Unknown
    }

    /// Get format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "gif" => Self::Gif,
            "webp" => Self::WebP,
            "avif" => Self::Avif,
            "svg" => Self::Svg,
            _ => Self::Unknown,
        }
    }

    fn to_image_format(self) -> Option<ImgFormat> {
        match self {
            Self::Png => Some(ImgFormat::Png),
            Self::Jpeg => Some(ImgFormat::Jpeg),
            Self::Gif => Some(ImgFormat::Gif),
            Self::WebP => Some(ImgFormat::WebP),
            Self::Avif => Some(ImgFormat::Avif),
            Self::Svg | Self::Unknown => None,
        }
    }
}

/// Image decoder
pub struct ImageDecoder;

impl ImageDecoder {
    /// Decode image from bytes, sniffing the format
    pub fn decode(data: &[u8]) -> Result<DynamicImage, ImageError> {
        Self::decode_with_format(data, ImageFormat::from_bytes(data))
    }

    /// Decode with known format
    pub fn decode_with_format(data: &[u8], format: ImageFormat) -> Result<DynamicImage, ImageError> {
        let img_format = format.to_image_format().ok_or(ImageError::UnsupportedFormat)?;

        let img = image::load(Cursor::new(data), img_format)
            .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(ImageError::DecodeFailed("image has no pixels".into()));
        }
        Ok(img)
    }
}

/// Image decoding errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ImageError {
    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Decode failed: {0}")]
    DecodeFailed(String),
}
