//! Gallery reconciliation
//!
//! Re-fetches every cached image and replaces the ones whose
//! `Content-Length` changed. Lengths are compared as header strings, so a
//! header absent on both sides counts as unchanged.

use std::sync::Arc;

use tracing::{debug, info, warn};
use vitrine_net::{Fetcher, Response};

use crate::cache_storage::CacheStorage;
use crate::proxy::OfflineProxy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub checked: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Whether `fresh` should replace `cached`
pub fn should_update(cached: Option<&Response>, fresh: &Response) -> bool {
    match cached {
        None => true,
        Some(cached) => cached.header("content-length") != fresh.header("content-length"),
    }
}

async fn reconcile(fetcher: Arc<dyn Fetcher>, caches: Arc<CacheStorage>, cache: String) -> SyncReport {
    let mut report = SyncReport::default();
    for url in caches.cache_keys(&cache) {
        report.checked += 1;
        match fetcher.get(&url).await {
            Ok(fresh) if fresh.ok() => {
                if should_update(caches.match_in(&cache, &url).as_ref(), &fresh) {
                    debug!(url = %url, "Replacing changed image");
                    caches.put(&cache, &url, fresh);
                    report.updated += 1;
                }
            }
            Ok(fresh) => debug!(url = %url, status = fresh.status, "Keeping cached image"),
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to sync image");
                report.failed += 1;
            }
        }
    }
    info!(checked = report.checked, updated = report.updated, "Gallery sync finished");
    report
}

impl OfflineProxy {
    pub async fn sync_gallery_images(&self) -> SyncReport {
        reconcile(Arc::clone(self.fetcher()), Arc::clone(self.caches()), self.config().image_cache()).await
    }

    /// Background sync event. Returns whether `tag` was recognised; the
    /// work itself runs in the background.
    pub fn on_sync(&self, tag: &str) -> bool {
        if tag != self.config().sync_tag {
            debug!(tag, "Ignoring sync tag");
            return false;
        }
        let fetcher = Arc::clone(self.fetcher());
        let caches = Arc::clone(self.caches());
        let cache = self.config().image_cache();
        self.spawn_background(async move {
            reconcile(fetcher, caches, cache).await;
        });
        true
    }
}
