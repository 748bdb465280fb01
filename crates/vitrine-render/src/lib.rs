//! Vitrine Render
//!
//! Decoding, format negotiation and the two image derivation pipelines:
//! placeholders shown while an asset loads, and persisted thumbnails.

pub mod decoder;
pub mod encode;
pub mod data_uri;
pub mod color;
pub mod svg;
pub mod placeholder;
pub mod thumbnail;

pub use decoder::{ImageDecoder, ImageError, ImageFormat};
pub use encode::{EncodeError, EncodedImage, FormatSupport};
pub use data_uri::DataUri;
pub use color::Rgb;
pub use placeholder::{Placeholder, PlaceholderConfig, PlaceholderGenerator, PlaceholderKind};
pub use thumbnail::{
    BatchItem, ImageSource, NamedSize, Thumbnail, ThumbnailConfig, ThumbnailError, ThumbnailGenerator,
    ThumbnailOptions,
};
