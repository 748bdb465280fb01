//! Vitrine Networking
//!
//! Request/response model, pluggable fetchers and request deduplication.

pub mod request;
pub mod fetcher;
pub mod dedup;
mod static_fetcher;

pub use request::{Method, Request};
pub use fetcher::{Fetcher, HttpFetcher};
pub use dedup::{DeduplicationStats, Flight, SingleFlight};
pub use static_fetcher::StaticFetcher;
pub use url::Url;

use std::sync::Arc;

/// HTTP Response
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Arc<Vec<u8>>,
}

impl Response {
    /// Create a response with no headers
    pub fn new(status: u16, status_text: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            status_text: status_text.to_string(),
            headers: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// 200 response carrying `body` with content type and length set
    pub fn ok_with(body: Vec<u8>, content_type: &str) -> Self {
        let len = body.len();
        Self::new(200, "OK", body)
            .with_header("Content-Type", content_type)
            .with_header("Content-Length", &len.to_string())
    }

    /// 503 response used when neither cache nor network can serve a request
    pub fn service_unavailable(message: &str) -> Self {
        Self::new(503, "Service Unavailable", message.as_bytes().to_vec())
            .with_header("Content-Type", "text/plain")
    }

    /// 404 response
    pub fn not_found() -> Self {
        Self::new(404, "Not Found", Vec::new())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Check if response is OK (2xx)
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Declared `Content-Length`, if any
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.trim().parse().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Turn a non-2xx response into [`NetError::HttpError`]
    pub fn error_for_status(self) -> Result<Self, NetError> {
        if self.ok() {
            Ok(self)
        } else {
            Err(NetError::HttpError { status: self.status })
        }
    }
}

/// Network error
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetError {
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network unreachable: {url}")]
    Offline { url: String },
}
