//! `data:` URIs
//!
//! Placeholders and thumbnails travel as base64 data URIs so they can be used
//! as an element source without any further storage.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri(String);

impl DataUri {
    pub fn from_bytes(mime_type: &str, data: &[u8]) -> Self {
        Self(format!("data:{};base64,{}", mime_type, STANDARD.encode(data)))
    }

    /// Accept an existing base64 data URI
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix("data:")?;
        let (meta, _) = rest.split_once(',')?;
        meta.ends_with(";base64").then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn mime_type(&self) -> &str {
        self.0
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .unwrap_or("")
    }

    fn payload(&self) -> &str {
        self.0.split_once(',').map(|(_, p)| p).unwrap_or("")
    }

    /// Payload size estimated from the base64 length
    pub fn decoded_size(&self) -> usize {
        (self.payload().len() as f64 * 0.75).round() as usize
    }

    pub fn decode(&self) -> Option<Vec<u8>> {
        STANDARD.decode(self.payload()).ok()
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
