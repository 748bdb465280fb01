//! Control channel
//!
//! JSON messages of the form `{"type": ..., "data": ...}` sent by the page.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::WorkerError;
use crate::proxy::OfflineProxy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ControlMessage {
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
    #[serde(rename = "CACHE_IMAGES")]
    CacheImages { urls: Vec<String> },
    #[serde(rename = "CLEAR_CACHE")]
    ClearCache {
        #[serde(rename = "cacheName", default, skip_serializing_if = "Option::is_none")]
        cache_name: Option<String>,
    },
    #[serde(rename = "GET_CACHE_STATS")]
    GetCacheStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ControlReply {
    /// Entry count per cache name
    #[serde(rename = "CACHE_STATS")]
    CacheStats(BTreeMap<String, usize>),
}

impl OfflineProxy {
    pub async fn handle_message(&self, message: ControlMessage) -> Option<ControlReply> {
        debug!(?message, "Control message");
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting();
                None
            }
            ControlMessage::CacheImages { urls } => {
                self.cache_images(&urls).await;
                None
            }
            ControlMessage::ClearCache { cache_name } => {
                self.clear_cache(cache_name.as_deref());
                None
            }
            ControlMessage::GetCacheStats => Some(ControlReply::CacheStats(self.caches().stats())),
        }
    }

    /// Parse, handle and serialise the reply, if any
    pub async fn handle_message_json(&self, raw: &str) -> Result<Option<String>, WorkerError> {
        let message: ControlMessage = serde_json::from_str(raw)?;
        match self.handle_message(message).await {
            Some(reply) => Ok(Some(serde_json::to_string(&reply)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let msg: ControlMessage = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(msg, ControlMessage::SkipWaiting);

        let msg: ControlMessage =
            serde_json::from_str(r#"{"type":"CACHE_IMAGES","data":{"urls":["/a.jpg"]}}"#).unwrap();
        assert_eq!(msg, ControlMessage::CacheImages { urls: vec!["/a.jpg".into()] });

        let msg: ControlMessage = serde_json::from_str(r#"{"type":"CLEAR_CACHE","data":{}}"#).unwrap();
        assert_eq!(msg, ControlMessage::ClearCache { cache_name: None });

        let msg: ControlMessage =
            serde_json::from_str(r#"{"type":"CLEAR_CACHE","data":{"cacheName":"old"}}"#).unwrap();
        assert_eq!(msg, ControlMessage::ClearCache { cache_name: Some("old".into()) });
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_str::<ControlMessage>(r#"{"type":"REBOOT"}"#).is_err());
    }

    #[test]
    fn test_reply_shape() {
        let mut stats = BTreeMap::new();
        stats.insert("events-studio-images-v1".to_string(), 3);
        let json = serde_json::to_string(&ControlReply::CacheStats(stats)).unwrap();
        assert_eq!(json, r#"{"type":"CACHE_STATS","data":{"events-studio-images-v1":3}}"#);
    }
}
