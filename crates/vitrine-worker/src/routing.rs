//! Request classification
//!
//! Decides which caching strategy a request gets from its URL path alone.

use url::Url;

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".avif", ".svg"];
const IMAGE_DIRS: &[&str] = &["/images/", "/assets/images/"];

const STATIC_EXTENSIONS: &[&str] = &[".css", ".js", ".woff", ".woff2", ".ttf", ".eot", ".ico", ".png"];
const STATIC_DIRS: &[&str] = &["/css/", "/js/", "/assets/", "/favicon/"];

/// Caching strategy for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Cache-first with background refresh, offline placeholder on failure
    Image,
    /// Cache-first
    Static,
    /// Network-first with cached fallback
    Navigation,
}

impl RequestClass {
    /// Classify by path. Image rules win over static ones.
    pub fn of(url: &Url) -> Self {
        let path = url.path().to_ascii_lowercase();
        if is_image_path(&path) {
            RequestClass::Image
        } else if is_static_path(&path) {
            RequestClass::Static
        } else {
            RequestClass::Navigation
        }
    }
}

fn is_image_path(path: &str) -> bool {
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) || IMAGE_DIRS.iter().any(|dir| path.contains(dir))
}

fn is_static_path(path: &str) -> bool {
    STATIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) || STATIC_DIRS.iter().any(|dir| path.contains(dir))
}

/// Last path segment, or `"image"` when the path has none
pub fn file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("image")
        .to_string()
}
