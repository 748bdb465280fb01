//! Pipeline wiring
//!
//! Every component fetches through a [`ProxyFetcher`], so page requests see
//! the offline caches exactly as a page controlled by the worker would.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use vitrine_cache::{BlobRegistry, ClearReport, KeyValueStore, ObjectCache};
use vitrine_loader::Scheduler;
use vitrine_net::{Fetcher, NetError, Request, Response};
use vitrine_render::{PlaceholderGenerator, ThumbnailGenerator};
use vitrine_worker::{InstallReport, OfflineProxy};

use crate::{Config, Error};

/// Fetcher that asks the offline proxy first and falls back to the
/// network for requests it does not intercept
#[derive(Debug, Clone)]
pub struct ProxyFetcher {
    proxy: Arc<OfflineProxy>,
}

impl ProxyFetcher {
    pub fn new(proxy: Arc<OfflineProxy>) -> Self {
        Self { proxy }
    }
}

#[async_trait]
impl Fetcher for ProxyFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        match self.proxy.handle_fetch(request.clone()).await {
            Some(response) => Ok(response),
            None => self.proxy.fetcher().fetch(request).await,
        }
    }
}

/// What [`AssetPipeline::clear_all`] released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearSummary {
    pub objects: ClearReport,
    pub thumbnails: usize,
    pub caches: usize,
}

pub struct AssetPipeline {
    config: Config,
    proxy: Arc<OfflineProxy>,
    cache: Arc<ObjectCache>,
    placeholders: Arc<PlaceholderGenerator>,
    thumbnails: ThumbnailGenerator,
    scheduler: Scheduler,
}

impl AssetPipeline {
    /// Wire every component over `network` and persisted `storage`
    pub fn new(network: Arc<dyn Fetcher>, storage: Arc<dyn KeyValueStore>, config: Config) -> Result<Self, Error> {
        config.validate()?;

        let proxy = Arc::new(OfflineProxy::new(network, config.proxy.clone())?);
        let fetcher: Arc<dyn Fetcher> = Arc::new(ProxyFetcher::new(Arc::clone(&proxy)));

        let cache = Arc::new(ObjectCache::new(Arc::new(BlobRegistry::new())));
        let placeholders = Arc::new(PlaceholderGenerator::new(Arc::clone(&fetcher), config.placeholder.clone()));
        let thumbnails = ThumbnailGenerator::new(Arc::clone(&fetcher), storage, config.thumbnail.clone());
        let scheduler = Scheduler::new(
            fetcher,
            Arc::clone(&cache),
            config.loader.clone(),
            config.transition.clone(),
        )
        .with_placeholders(Arc::clone(&placeholders));

        Ok(Self { config, proxy, cache, placeholders, thumbnails, scheduler })
    }

    /// Install and activate the offline proxy
    pub async fn start(&self) -> Result<InstallReport, Error> {
        let report = self.proxy.install().await?;
        self.proxy.activate()?;
        if !report.is_complete() {
            warn!(failed = report.failed.len(), "Asset pipeline started without a full offline cache");
        }
        info!("Asset pipeline started");
        Ok(report)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn proxy(&self) -> &Arc<OfflineProxy> {
        &self.proxy
    }

    pub fn cache(&self) -> &Arc<ObjectCache> {
        &self.cache
    }

    pub fn placeholders(&self) -> &Arc<PlaceholderGenerator> {
        &self.placeholders
    }

    pub fn thumbnails(&self) -> &ThumbnailGenerator {
        &self.thumbnails
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Drop in-memory objects, persisted thumbnails and every offline cache
    pub fn clear_all(&self) -> ClearSummary {
        ClearSummary {
            objects: self.scheduler.clear_cache(),
            thumbnails: self.thumbnails.clear_cache(),
            caches: self.proxy.clear_cache(None),
        }
    }
}

impl std::fmt::Debug for AssetPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetPipeline")
            .field("proxy", &self.proxy)
            .field("cached_objects", &self.cache.len())
            .finish_non_exhaustive()
    }
}
