//! In-memory fetcher
//!
//! Serves a fixed route table and can be switched offline. Used to simulate
//! the network for previews, offline rehearsal and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{Fetcher, NetError, Request, Response};

#[derive(Debug, Default)]
pub struct StaticFetcher {
    routes: Mutex<HashMap<String, Response>>,
    requests: Mutex<HashMap<String, usize>>,
    offline: AtomicBool,
    latency: Option<Duration>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Serve `response` for `url`, replacing any previous route
    pub fn route(&self, url: &str, response: Response) {
        self.routes.lock().insert(url.to_string(), response);
    }

    /// Serve `body` as a 200 with the given content type
    pub fn route_bytes(&self, url: &str, body: Vec<u8>, content_type: &str) {
        self.route(url, Response::ok_with(body, content_type));
    }

    pub fn remove_route(&self, url: &str) {
        self.routes.lock().remove(url);
    }

    /// Simulate the network being unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Number of requests seen for `url`, including failed ones
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().values().sum()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        *self.requests.lock().entry(request.url.clone()).or_insert(0) += 1;

        if let Some(latency) = self.latency {
            smol::Timer::after(latency).await;
        }

        if self.is_offline() {
            return Err(NetError::Offline { url: request.url });
        }

        let routed = self.routes.lock().get(&request.url).cloned();
        Ok(routed.unwrap_or_else(Response::not_found))
    }
}
