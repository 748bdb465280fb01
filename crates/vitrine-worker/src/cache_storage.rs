//! Named response caches
//!
//! Caches are keyed by absolute URL and only ever hold GET responses.
//! Storage is shared between the proxy and its background tasks, so every
//! call takes the lock briefly and hands back owned values.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use vitrine_net::Response;

/// Container for named caches, searched in creation order
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: Mutex<Vec<(String, Cache)>>,
}

/// Named cache of URL/response pairs
#[derive(Debug, Clone, Default)]
pub struct Cache {
    entries: Vec<CacheEntry>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    url: String,
    response: Response,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the cache if it does not exist yet
    pub fn open(&self, name: &str) {
        let mut caches = self.caches.lock();
        if !caches.iter().any(|(n, _)| n == name) {
            caches.push((name.to_string(), Cache::new()));
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.caches.lock().iter().any(|(n, _)| n == name)
    }

    /// Delete a cache
    pub fn delete(&self, name: &str) -> bool {
        let mut caches = self.caches.lock();
        let before = caches.len();
        caches.retain(|(n, _)| n != name);
        caches.len() < before
    }

    /// Delete every cache, returning how many there were
    pub fn clear(&self) -> usize {
        let mut caches = self.caches.lock();
        let count = caches.len();
        caches.clear();
        count
    }

    /// Cache names in creation order
    pub fn keys(&self) -> Vec<String> {
        self.caches.lock().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Store `response` under `url` in `name`, opening the cache if needed
    pub fn put(&self, name: &str, url: &str, response: Response) {
        let mut caches = self.caches.lock();
        match caches.iter_mut().find(|(n, _)| n.as_str() == name) {
            Some((_, cache)) => cache.put(url, response),
            None => {
                let mut cache = Cache::new();
                cache.put(url, response);
                caches.push((name.to_string(), cache));
            }
        }
    }

    /// Look `url` up in one cache
    pub fn match_in(&self, name: &str, url: &str) -> Option<Response> {
        self.caches
            .lock()
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, cache)| cache.match_url(url).cloned())
    }

    /// First response for `url` across all caches
    pub fn match_any(&self, url: &str) -> Option<Response> {
        self.caches
            .lock()
            .iter()
            .find_map(|(_, cache)| cache.match_url(url).cloned())
    }

    /// URLs stored in `name`
    pub fn cache_keys(&self, name: &str) -> Vec<String> {
        self.caches
            .lock()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, cache)| cache.keys().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Entry count per cache
    pub fn stats(&self) -> BTreeMap<String, usize> {
        self.caches
            .lock()
            .iter()
            .map(|(n, cache)| (n.clone(), cache.len()))
            .collect()
    }
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `url`
    pub fn put(&mut self, url: &str, response: Response) {
        self.entries.retain(|e| e.url != url);
        self.entries.push(CacheEntry { url: url.to_string(), response });
    }

    pub fn match_url(&self, url: &str) -> Option<&Response> {
        self.entries.iter().find(|e| e.url == url).map(|e| &e.response)
    }

    pub fn delete(&mut self, url: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.url != url);
        self.entries.len() < before
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.url.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
