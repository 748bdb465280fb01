//! Offline cache proxy
//!
//! Intercepts GET requests once activated and answers them from three named
//! caches: static assets and images cache-first, navigations network-first.
//! Background work (image revalidation, sync) runs on spawned tasks that
//! [`OfflineProxy::wait_until_idle`] can drain.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::future::join_all;
use parking_lot::Mutex;
use smol::Task;
use tracing::{debug, error, info, warn};
use url::Url;
use vitrine_net::{Fetcher, Request, Response};
use vitrine_render::svg::offline_svg;

use crate::cache_storage::CacheStorage;
use crate::config::ProxyConfig;
use crate::push::Notification;
use crate::routing::{self, RequestClass};
use crate::{WorkerError, WorkerState};

/// What `install` stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub static_cached: usize,
    pub images_cached: usize,
    /// URLs that could not be fetched; their manifest was not stored
    pub failed: Vec<String>,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct OfflineProxy {
    config: ProxyConfig,
    origin: Url,
    fetcher: Arc<dyn Fetcher>,
    caches: Arc<CacheStorage>,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
    background: Mutex<Vec<Task<()>>>,
    pub(crate) notifications: Mutex<Vec<Notification>>,
    pub(crate) next_notification: AtomicU64,
}

impl OfflineProxy {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: ProxyConfig) -> Result<Self, WorkerError> {
        Self::with_storage(fetcher, Arc::new(CacheStorage::new()), config)
    }

    /// Proxy over existing cache storage, as left by a previous version
    pub fn with_storage(
        fetcher: Arc<dyn Fetcher>,
        caches: Arc<CacheStorage>,
        config: ProxyConfig,
    ) -> Result<Self, WorkerError> {
        config.validate()?;
        let origin = Url::parse(&config.origin).map_err(|_| WorkerError::InvalidUrl(config.origin.clone()))?;
        Ok(Self {
            config,
            origin,
            fetcher,
            caches,
            state: Mutex::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            background: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
            next_notification: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn caches(&self) -> &Arc<CacheStorage> {
        &self.caches
    }

    /// Network behind the proxy
    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Installed but not told to skip waiting
    pub fn is_waiting(&self) -> bool {
        self.state() == WorkerState::Installed && !self.skip_waiting.load(Ordering::Acquire)
    }

    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::Release);
    }

    /// Resolve `url` against the origin
    pub fn resolve(&self, url: &str) -> Result<Url, WorkerError> {
        self.origin.join(url).map_err(|_| WorkerError::InvalidUrl(url.to_string()))
    }

    fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), WorkerError> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(WorkerError::InvalidState { expected: from, actual: *state });
        }
        *state = to;
        Ok(())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Seed the static cache, then the image cache, then skip waiting.
    ///
    /// A manifest with any failed URL is not stored and the image manifest
    /// is skipped after a static failure. The worker is installed either way
    /// but keeps waiting, and the report lists what failed.
    pub async fn install(&self) -> Result<InstallReport, WorkerError> {
        self.transition(WorkerState::Parsed, WorkerState::Installing)?;
        info!("Installing offline proxy");

        let mut report = InstallReport::default();
        let seeded = async {
            report.static_cached = self.seed(&self.config.static_cache(), &self.config.static_assets).await?;
            report.images_cached = self.seed(&self.config.image_cache(), &self.config.gallery_images).await?;
            Ok::<_, Vec<String>>(())
        }
        .await;

        *self.state.lock() = WorkerState::Installed;
        match seeded {
            Ok(()) => {
                self.skip_waiting();
                info!(
                    static_cached = report.static_cached,
                    images_cached = report.images_cached,
                    "Offline proxy installed"
                );
            }
            Err(failed) => {
                error!(failed = failed.len(), "Failed to cache assets during install");
                report.failed = failed;
            }
        }
        Ok(report)
    }

    /// Fetch every path; store them all only if every one succeeded,
    /// otherwise return the ones that did not
    async fn seed(&self, cache: &str, paths: &[String]) -> Result<usize, Vec<String>> {
        let mut failed = Vec::new();
        let mut urls = Vec::with_capacity(paths.len());
        for path in paths {
            match self.resolve(path) {
                Ok(url) => urls.push(url),
                Err(e) => {
                    warn!(cache, error = %e, "Cannot seed");
                    failed.push(path.clone());
                }
            }
        }

        let responses = join_all(urls.iter().map(|u| self.fetcher.get(u.as_str()))).await;

        let mut fetched = Vec::with_capacity(urls.len());
        for (url, result) in urls.into_iter().zip(responses) {
            match result {
                Ok(resp) if resp.ok() => fetched.push((url, resp)),
                Ok(resp) => {
                    warn!(cache, url = %url, status = resp.status, "Seed request failed");
                    failed.push(url.to_string());
                }
                Err(e) => {
                    warn!(cache, url = %url, error = %e, "Seed request failed");
                    failed.push(url.to_string());
                }
            }
        }
        if !failed.is_empty() {
            return Err(failed);
        }

        self.caches.open(cache);
        let count = fetched.len();
        for (url, resp) in fetched {
            self.caches.put(cache, url.as_str(), resp);
        }
        debug!(cache, count, "Seeded cache");
        Ok(count)
    }

    /// Delete every cache that is not one of the current three
    pub fn activate(&self) -> Result<Vec<String>, WorkerError> {
        self.transition(WorkerState::Installed, WorkerState::Activating)?;
        info!("Activating offline proxy");

        let keep = self.config.current_caches();
        let stale: Vec<String> = self.caches.keys().into_iter().filter(|name| !keep.contains(name)).collect();
        for name in &stale {
            info!(cache = %name, "Deleting old cache");
            self.caches.delete(name);
        }

        *self.state.lock() = WorkerState::Activated;
        Ok(stale)
    }

    // ========================================================================
    // Fetch interception
    // ========================================================================

    /// Answer `request`, or `None` when the proxy does not intercept it
    /// (not activated, not GET, or an unresolvable URL).
    pub async fn handle_fetch(&self, request: Request) -> Option<Response> {
        if self.state() != WorkerState::Activated || !request.is_get() {
            return None;
        }
        let url = match self.resolve(&request.url) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Not intercepting request");
                return None;
            }
        };
        let request = Request { url: url.to_string(), ..request };

        Some(match RequestClass::of(&url) {
            RequestClass::Image => self.serve_image(&url, request).await,
            RequestClass::Static => self.serve_static(request).await,
            RequestClass::Navigation => self.serve_navigation(request).await,
        })
    }

    async fn serve_image(&self, url: &Url, request: Request) -> Response {
        let cache = self.config.image_cache();
        if let Some(hit) = self.caches.match_in(&cache, &request.url) {
            debug!(url = %request.url, "Image cache hit");
            self.revalidate(cache, request);
            return hit;
        }

        let key = request.url.clone();
        match self.fetcher.fetch(request).await {
            Ok(resp) => {
                if resp.ok() {
                    self.caches.put(&cache, &key, resp.clone());
                }
                resp
            }
            Err(e) => {
                warn!(url = %key, error = %e, "Image unavailable, serving offline placeholder");
                offline_image(url)
            }
        }
    }

    /// Refresh a cached image without blocking the response
    fn revalidate(&self, cache: String, request: Request) {
        let fetcher = Arc::clone(&self.fetcher);
        let caches = Arc::clone(&self.caches);
        self.spawn_background(async move {
            let url = request.url.clone();
            match fetcher.fetch(request).await {
                Ok(resp) if resp.ok() => caches.put(&cache, &url, resp),
                Ok(resp) => debug!(url = %url, status = resp.status, "Revalidation kept cached copy"),
                Err(e) => debug!(url = %url, error = %e, "Revalidation failed"),
            }
        });
    }

    async fn serve_static(&self, request: Request) -> Response {
        let cache = self.config.static_cache();
        if let Some(hit) = self.caches.match_in(&cache, &request.url) {
            debug!(url = %request.url, "Static cache hit");
            return hit;
        }

        let key = request.url.clone();
        match self.fetcher.fetch(request).await {
            Ok(resp) => {
                if resp.ok() {
                    self.caches.put(&cache, &key, resp.clone());
                }
                resp
            }
            Err(e) => {
                warn!(url = %key, error = %e, "Static asset unavailable");
                Response::service_unavailable("Resource not available offline")
            }
        }
    }

    async fn serve_navigation(&self, request: Request) -> Response {
        let key = request.url.clone();
        match self.fetcher.fetch(request).await {
            Ok(resp) => {
                if resp.ok() {
                    self.caches.put(&self.config.gallery_cache(), &key, resp.clone());
                }
                resp
            }
            Err(e) => {
                debug!(url = %key, error = %e, "Navigation failed, trying caches");
                self.cached_navigation(&key)
                    .unwrap_or_else(|| Response::service_unavailable("Page not available offline"))
            }
        }
    }

    fn cached_navigation(&self, url: &str) -> Option<Response> {
        if let Some(hit) = self.caches.match_any(url) {
            return Some(hit);
        }
        self.config
            .root_documents
            .iter()
            .filter_map(|doc| self.resolve(doc).ok())
            .find_map(|doc| self.caches.match_any(doc.as_str()))
    }

    // ========================================================================
    // Cache management
    // ========================================================================

    /// Fetch `urls` into the image cache, returning how many were stored
    pub async fn cache_images(&self, urls: &[String]) -> usize {
        let cache = self.config.image_cache();
        let resolved: Vec<Url> = urls
            .iter()
            .filter_map(|u| match self.resolve(u) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(error = %e, "Skipping image");
                    None
                }
            })
            .collect();

        let results = join_all(resolved.iter().map(|u| self.fetcher.get(u.as_str()))).await;
        let mut stored = 0;
        for (url, result) in resolved.iter().zip(results) {
            match result {
                Ok(resp) if resp.ok() => {
                    self.caches.put(&cache, url.as_str(), resp);
                    stored += 1;
                }
                Ok(resp) => debug!(url = %url, status = resp.status, "Not caching image"),
                Err(e) => warn!(url = %url, error = %e, "Failed to cache image"),
            }
        }
        stored
    }

    /// Delete one named cache, or all of them. Returns how many went.
    pub fn clear_cache(&self, name: Option<&str>) -> usize {
        let cleared = match name {
            Some(name) => usize::from(self.caches.delete(name)),
            None => self.caches.clear(),
        };
        info!(cleared, "Cleared caches");
        cleared
    }

    // ========================================================================
    // Background work
    // ========================================================================

    pub(crate) fn spawn_background<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = smol::spawn(future);
        let mut background = self.background.lock();
        background.retain(|t| !t.is_finished());
        background.push(task);
    }

    /// Await every outstanding background task, including ones spawned
    /// while waiting
    pub async fn wait_until_idle(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.background.lock());
            if tasks.is_empty() {
                break;
            }
            join_all(tasks).await;
        }
    }
}

impl std::fmt::Debug for OfflineProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineProxy")
            .field("origin", &self.origin.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn offline_image(url: &Url) -> Response {
    Response::new(200, "OK", offline_svg(&routing::file_name(url)).into_bytes())
        .with_header("Content-Type", "image/svg+xml")
        .with_header("Cache-Control", "no-cache")
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_net::StaticFetcher;

    fn small_config() -> ProxyConfig {
        ProxyConfig {
            origin: "https://site.test/".into(),
            static_assets: vec!["/index.html".into()],
            gallery_images: vec!["/assets/images/1.jpg".into()],
            ..Default::default()
        }
    }

    fn routed() -> Arc<StaticFetcher> {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.route_bytes("https://site.test/index.html", b"<html>".to_vec(), "text/html");
        fetcher.route_bytes("https://site.test/assets/images/1.jpg", vec![1, 2, 3], "image/jpeg");
        fetcher
    }

    #[test]
    fn test_lifecycle() {
        let proxy = OfflineProxy::new(routed(), small_config()).unwrap();
        assert_eq!(proxy.state(), WorkerState::Parsed);

        let report = smol::block_on(proxy.install()).unwrap();
        assert_eq!(report, InstallReport { static_cached: 1, images_cached: 1, failed: vec![] });
        assert!(report.is_complete());
        assert_eq!(proxy.state(), WorkerState::Installed);
        assert!(!proxy.is_waiting());

        proxy.activate().unwrap();
        assert_eq!(proxy.state(), WorkerState::Activated);
        assert!(matches!(proxy.activate(), Err(WorkerError::InvalidState { .. })));
    }

    #[test]
    fn test_failed_seed_still_installs() {
        let fetcher = routed();
        fetcher.remove_route("https://site.test/assets/images/1.jpg");
        let proxy = OfflineProxy::new(fetcher, small_config()).unwrap();

        let report = smol::block_on(proxy.install()).unwrap();
        assert_eq!(report.static_cached, 1);
        assert_eq!(report.images_cached, 0);
        assert_eq!(report.failed, vec!["https://site.test/assets/images/1.jpg".to_string()]);
        assert_eq!(proxy.state(), WorkerState::Installed);
        assert!(proxy.is_waiting());
        // Static seed succeeded before the image seed failed
        assert_eq!(proxy.caches().stats().get("events-studio-static-v1"), Some(&1));
        assert!(!proxy.caches().has("events-studio-images-v1"));

        proxy.activate().unwrap();
        assert_eq!(proxy.state(), WorkerState::Activated);
    }

    #[test]
    fn test_not_intercepted_before_activation() {
        let proxy = OfflineProxy::new(routed(), small_config()).unwrap();
        assert!(smol::block_on(proxy.handle_fetch(Request::get("/index.html"))).is_none());
    }

    #[test]
    fn test_non_get_passes_through() {
        let proxy = OfflineProxy::new(routed(), small_config()).unwrap();
        smol::block_on(proxy.install()).unwrap();
        proxy.activate().unwrap();
        assert!(smol::block_on(proxy.handle_fetch(Request::post("/index.html"))).is_none());
    }

    #[test]
    fn test_offline_image_placeholder() {
        let url = Url::parse("https://site.test/assets/images/ST1.webp").unwrap();
        let resp = offline_image(&url);
        assert_eq!(resp.content_type(), Some("image/svg+xml"));
        assert_eq!(resp.header("cache-control"), Some("no-cache"));
        let body = String::from_utf8(resp.bytes().to_vec()).unwrap();
        assert!(body.contains("ST1.webp"));
        assert!(body.contains("Offline"));
    }
}
