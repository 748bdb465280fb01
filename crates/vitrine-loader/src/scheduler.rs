//! Viewport scheduler
//!
//! Decides when each observed image is fetched. Any of these makes an
//! element eligible:
//!
//! - proximity: it intersects the viewport grown by the root margin
//! - hover over its container
//! - scroll prediction: it lies ahead of the settled scroll direction
//! - idle time: bounded batches of anything not loaded yet
//! - `data-critical`: loaded up front by [`Scheduler::preload_critical`]
//!
//! Every trigger funnels into [`Scheduler::load`], which collapses concurrent
//! loads of one resource into a single fetch. Fetched bytes become a blob in
//! the [`ObjectCache`] and the element's `src` switches to its object URL.
//! The fetch publishes its result to the cache and load state before it
//! leaves the in-flight table, so a later trigger finds one or the other.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use smol::Timer;
use vitrine_cache::{AssetFormat, CacheEntry, ClearReport, ObjectCache, Representation};
use vitrine_net::{DeduplicationStats, Fetcher, NetError, SingleFlight};
use vitrine_render::{Placeholder, PlaceholderGenerator};

use crate::config::{LoaderConfig, TransitionConfig};
use crate::element::{ElementId, ImageElement};
use crate::transition::{TransitionController, TransitionEvent};
use crate::viewport::{Rect, Viewport};

/// Per-resource load state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Unseen,
    Pending,
    Loaded,
    Failed,
}

/// What made an element eligible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleTrigger {
    Proximity,
    Hover,
    Scroll,
    Idle,
    Critical,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Result of one idle batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleOutcome {
    /// Nothing left to preload
    Done,
    /// More elements are waiting for the next idle slot
    Reschedule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Fetched and displayed
    Loaded { src: String, deduplicated: bool },
    /// Served from the object cache without a fetch
    FromCache { src: String },
    /// Fetch failed; `fallback` is the source applied instead, if any
    Failed { fallback: Option<String> },
    /// Element was unobserved before the result arrived
    Detached,
    /// Nothing to load
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub observed: usize,
    pub loaded: usize,
    pub pending: usize,
    pub failed: usize,
    pub cached: usize,
    pub deduplicated: u64,
}

/// Fetch `key` and record the outcome in `cache` and `inner`
async fn fetch_and_publish(
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<ObjectCache>,
    shared: Arc<Mutex<Inner>>,
    key: String,
) -> Result<Representation, NetError> {
    let fetched = async {
        let response = fetcher.get(&key).await?.error_for_status()?;
        let mime_type = response
            .content_type()
            .unwrap_or(AssetFormat::Raw.mime_type())
            .to_string();
        Ok::<_, NetError>((response.body, mime_type))
    }
    .await;

    let mut inner = shared.lock();
    match fetched {
        Ok((body, mime_type)) => {
            let representation = cache.get(&key).unwrap_or_else(|| {
                let url = cache.blobs().create_object_url(Arc::clone(&body), &mime_type);
                let representation = Representation::Object(url);
                cache.set(CacheEntry::new(&key, representation.clone(), body.len(), AssetFormat::Raw));
                representation
            });
            inner.states.insert(key, LoadState::Loaded);
            Ok(representation)
        }
        Err(e) => {
            if inner.state(&key) != LoadState::Loaded {
                inner.states.insert(key, LoadState::Failed);
            }
            Err(e)
        }
    }
}

#[derive(Debug, Default)]
struct ScrollTracker {
    settled_y: f32,
    current_y: f32,
    last_event: Option<Instant>,
}

struct Inner {
    next_id: u64,
    elements: BTreeMap<ElementId, ImageElement>,
    states: HashMap<String, LoadState>,
    viewport: Viewport,
    scroll: ScrollTracker,
    transitions: TransitionController,
}

impl Inner {
    fn state(&self, key: &str) -> LoadState {
        self.states.get(key).copied().unwrap_or_default()
    }

    fn state_of(&self, element: &ImageElement) -> Option<LoadState> {
        element.resource().map(|key| self.state(key))
    }
}

pub struct Scheduler {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<ObjectCache>,
    placeholders: Option<Arc<PlaceholderGenerator>>,
    config: LoaderConfig,
    flights: SingleFlight<String, Result<Representation, NetError>>,
    inner: Arc<Mutex<Inner>>,
}

impl Scheduler {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        cache: Arc<ObjectCache>,
        config: LoaderConfig,
        transitions: TransitionConfig,
    ) -> Self {
        Self {
            fetcher,
            cache,
            placeholders: None,
            config,
            flights: SingleFlight::new(),
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                elements: BTreeMap::new(),
                states: HashMap::new(),
                viewport: Viewport::default(),
                scroll: ScrollTracker::default(),
                transitions: TransitionController::new(transitions),
            })),
        }
    }

    /// Use `placeholders` for progressive elements
    pub fn with_placeholders(mut self, placeholders: Arc<PlaceholderGenerator>) -> Self {
        self.placeholders = Some(placeholders);
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ObjectCache> {
        &self.cache
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Start tracking `element`. Ids increase in registration order, which
    /// is treated as document order.
    pub fn observe(&self, element: ImageElement) -> ElementId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = ElementId(inner.next_id);
        tracing::trace!("observing {} ({:?})", id, element.resource());
        inner.elements.insert(id, element);
        id
    }

    /// Stop tracking `id`, returning the element's final state. A fetch
    /// already running for it completes but no longer touches the element.
    pub fn unobserve(&self, id: ElementId) -> Option<ImageElement> {
        let mut inner = self.inner.lock();
        inner.transitions.cancel(id);
        inner.elements.remove(&id)
    }

    pub fn set_rect(&self, id: ElementId, rect: Rect) -> bool {
        match self.inner.lock().elements.get_mut(&id) {
            Some(element) => {
                element.rect = rect;
                true
            }
            None => false,
        }
    }

    pub fn set_container(&self, id: ElementId, container: Option<&str>) -> bool {
        match self.inner.lock().elements.get_mut(&id) {
            Some(element) => {
                element.container = container.map(str::to_string);
                true
            }
            None => false,
        }
    }

    /// Snapshot of an observed element
    pub fn element(&self, id: ElementId) -> Option<ImageElement> {
        self.inner.lock().elements.get(&id).cloned()
    }

    pub fn load_state(&self, key: &str) -> LoadState {
        self.inner.lock().state(key)
    }

    pub fn viewport(&self) -> Viewport {
        self.inner.lock().viewport
    }

    // ------------------------------------------------------------------
    // Triggers
    // ------------------------------------------------------------------

    /// Record the current viewport and load lazy or progressive elements that
    /// entered the proximity zone
    pub async fn update_viewport(&self, viewport: Viewport) -> Vec<(ElementId, LoadOutcome)> {
        let ids = {
            let mut inner = self.inner.lock();
            inner.viewport = viewport;
            inner.scroll.current_y = viewport.y;
            if !self.config.enable_lazy_loading {
                return Vec::new();
            }

            let zone = viewport.expand(self.config.root_margin);
            inner
                .elements
                .iter()
                .filter(|(_, el)| el.is_lazy() || el.is_progressive())
                .filter(|(_, el)| inner.state_of(el) == Some(LoadState::Unseen))
                .filter(|(_, el)| {
                    let ratio = zone.intersection_ratio(&el.rect);
                    ratio > 0.0 && ratio >= self.config.threshold
                })
                .map(|(id, _)| *id)
                .collect::<Vec<_>>()
        };

        self.load_all(ids, ScheduleTrigger::Proximity).await
    }

    /// Pointer entered `container`
    pub async fn on_hover(&self, container: &str) -> Vec<(ElementId, LoadOutcome)> {
        if !self.config.enable_preloading {
            return Vec::new();
        }
        let ids = {
            let inner = self.inner.lock();
            inner
                .elements
                .iter()
                .filter(|(_, el)| el.container.as_deref() == Some(container))
                .filter(|(_, el)| inner.state_of(el).is_some_and(|s| s != LoadState::Loaded))
                .map(|(id, _)| *id)
                .collect::<Vec<_>>()
        };

        self.load_all(ids, ScheduleTrigger::Hover).await
    }

    /// Record a scroll event at offset `y`
    pub fn on_scroll(&self, y: f32, now: Instant) {
        let mut inner = self.inner.lock();
        inner.scroll.current_y = y;
        inner.scroll.last_event = Some(now);
        inner.viewport = inner.viewport.scrolled_to(y);
    }

    /// If scrolling has been quiet for the settle period, preload what lies
    /// ahead in the scroll direction
    pub async fn poll_scroll_settled(&self, now: Instant) -> Vec<(ElementId, LoadOutcome)> {
        let ids = {
            let mut inner = self.inner.lock();
            let Some(last) = inner.scroll.last_event else {
                return Vec::new();
            };
            if now.saturating_duration_since(last) < self.config.scroll_settle() {
                return Vec::new();
            }

            let direction = if inner.scroll.current_y > inner.scroll.settled_y {
                ScrollDirection::Down
            } else {
                ScrollDirection::Up
            };
            inner.scroll.settled_y = inner.scroll.current_y;
            inner.scroll.last_event = None;

            if !self.config.enable_preloading {
                return Vec::new();
            }
            tracing::debug!("scroll settled at {} heading {:?}", inner.scroll.current_y, direction);

            let viewport = inner.viewport;
            let look_ahead = self.config.look_ahead;
            inner
                .elements
                .iter()
                .filter(|(_, el)| inner.state_of(el).is_some_and(|s| s != LoadState::Loaded))
                .filter(|(_, el)| match direction {
                    ScrollDirection::Down => {
                        el.rect.top() > viewport.top() && el.rect.top() <= viewport.bottom() + look_ahead
                    }
                    ScrollDirection::Up => {
                        el.rect.bottom() >= viewport.top() - look_ahead && el.rect.bottom() < viewport.bottom()
                    }
                })
                .map(|(id, _)| *id)
                .collect::<Vec<_>>()
        };

        self.load_all(ids, ScheduleTrigger::Scroll).await
    }

    /// Load up to `preload_count` elements never attempted before
    pub async fn run_idle_batch(&self) -> (IdleOutcome, Vec<(ElementId, LoadOutcome)>) {
        if !self.config.enable_preloading {
            return (IdleOutcome::Done, Vec::new());
        }
        let (ids, remaining) = {
            let inner = self.inner.lock();
            let mut seen = std::collections::HashSet::new();
            let candidates: Vec<ElementId> = inner
                .elements
                .iter()
                .filter_map(|(id, el)| el.resource().map(|key| (*id, key)))
                .filter(|(_, key)| inner.state(key) == LoadState::Unseen && seen.insert(*key))
                .map(|(id, _)| id)
                .collect();
            let remaining = candidates.len().saturating_sub(self.config.preload_count);
            (candidates.into_iter().take(self.config.preload_count).collect::<Vec<_>>(), remaining)
        };

        let results = self.load_all(ids, ScheduleTrigger::Idle).await;
        let outcome = if remaining > 0 { IdleOutcome::Reschedule } else { IdleOutcome::Done };
        (outcome, results)
    }

    /// Run idle batches until nothing is left, pausing between them
    pub async fn preload_idle(&self) -> usize {
        let mut attempted = 0;
        loop {
            let (outcome, results) = self.run_idle_batch().await;
            attempted += results.len();
            if outcome == IdleOutcome::Done {
                break;
            }
            Timer::after(self.config.idle_delay()).await;
        }
        attempted
    }

    /// Load the first `preload_count` `data-critical` elements
    pub async fn preload_critical(&self) -> Vec<(ElementId, LoadOutcome)> {
        if !self.config.enable_preloading {
            return Vec::new();
        }
        let ids = {
            let inner = self.inner.lock();
            inner
                .elements
                .iter()
                .filter(|(_, el)| el.is_critical())
                .take(self.config.preload_count)
                .map(|(id, _)| *id)
                .collect::<Vec<_>>()
        };

        self.load_all(ids, ScheduleTrigger::Critical).await
    }

    async fn load_all(&self, ids: Vec<ElementId>, trigger: ScheduleTrigger) -> Vec<(ElementId, LoadOutcome)> {
        let loads = ids.iter().map(|&id| self.load(id, trigger));
        let outcomes = futures::future::join_all(loads).await;
        ids.into_iter().zip(outcomes).collect()
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Show a placeholder on a progressive element while its image loads
    pub async fn show_placeholder(&self, id: ElementId) -> Option<Placeholder> {
        if !self.config.enable_progressive {
            return None;
        }
        let generator = self.placeholders.as_ref()?;
        let (src, width, height) = {
            let inner = self.inner.lock();
            let element = inner.elements.get(&id)?;
            if !element.is_progressive() {
                return None;
            }
            let src = element.resource()?.to_string();
            if inner.state(&src) == LoadState::Loaded {
                return None;
            }
            (src, element.width_hint(), element.height_hint())
        };

        let placeholder = generator.generate(&src, width, height).await;

        let mut inner = self.inner.lock();
        if matches!(inner.state(&src), LoadState::Loaded | LoadState::Failed) {
            return None;
        }
        let Inner { elements, transitions, .. } = &mut *inner;
        let element = elements.get_mut(&id)?;
        transitions.begin_placeholder(element, placeholder.uri.as_str());
        Some(placeholder)
    }

    /// Load the resource of element `id`
    pub async fn load(&self, id: ElementId, trigger: ScheduleTrigger) -> LoadOutcome {
        let key = {
            let mut inner = self.inner.lock();
            let Some(element) = inner.elements.get(&id) else {
                return LoadOutcome::Detached;
            };
            let Some(key) = element.resource().map(str::to_string) else {
                return LoadOutcome::Skipped;
            };

            if let Some(representation) = self.cache.get(&key) {
                let src = representation.as_src().to_string();
                inner.states.insert(key, LoadState::Loaded);
                self.apply_success(&mut inner, id, &src);
                return LoadOutcome::FromCache { src };
            }
            if inner.state(&key) == LoadState::Loaded {
                return LoadOutcome::Skipped;
            }

            inner.states.insert(key.clone(), LoadState::Pending);
            key
        };

        tracing::debug!("loading {} for {} ({:?})", key, id, trigger);
        let fetcher = Arc::clone(&self.fetcher);
        let cache = Arc::clone(&self.cache);
        let shared = Arc::clone(&self.inner);
        let url = key.clone();
        let flight = self
            .flights
            .run(key.clone(), move || fetch_and_publish(fetcher, cache, shared, url))
            .await;

        let mut inner = self.inner.lock();
        match flight.value {
            Ok(representation) => {
                if !inner.elements.contains_key(&id) {
                    tracing::debug!("{} detached before {} arrived", id, key);
                    return LoadOutcome::Detached;
                }
                let src = representation.as_src().to_string();
                self.apply_success(&mut inner, id, &src);
                LoadOutcome::Loaded { src, deduplicated: flight.was_deduplicated }
            }
            Err(e) => {
                tracing::warn!("failed to load image {}: {}", key, e);
                if !inner.elements.contains_key(&id) {
                    return LoadOutcome::Detached;
                }
                LoadOutcome::Failed { fallback: self.apply_failure(&mut inner, id) }
            }
        }
    }

    fn apply_success(&self, inner: &mut Inner, id: ElementId, src: &str) {
        let Inner { elements, transitions, .. } = inner;
        let Some(element) = elements.get_mut(&id) else {
            return;
        };
        if element.src == src {
            return;
        }

        let now = Instant::now();
        if self.config.enable_progressive && element.is_progressive() {
            transitions.reveal(id, element, src, now);
        } else {
            transitions.fade_in(id, element, src, now);
        }
    }

    fn apply_failure(&self, inner: &mut Inner, id: ElementId) -> Option<String> {
        let Inner { elements, transitions, .. } = inner;
        let element = elements.get_mut(&id)?;
        let fallback = element.fallback().map(str::to_string);

        if element.is_progressive() || fallback.is_some() {
            transitions.fail(id, element);
        }
        if let Some(fallback) = &fallback {
            element.src = fallback.clone();
        }
        fallback
    }

    // ------------------------------------------------------------------
    // Housekeeping
    // ------------------------------------------------------------------

    /// Complete transitions due at `now`
    pub fn advance(&self, now: Instant) -> Vec<TransitionEvent> {
        let mut inner = self.inner.lock();
        let Inner { elements, transitions, .. } = &mut *inner;
        transitions.advance(now, elements)
    }

    pub fn stats(&self) -> SchedulerStats {
        let inner = self.inner.lock();
        let mut stats = SchedulerStats {
            observed: inner.elements.len(),
            cached: self.cache.len(),
            deduplicated: self.dedup_stats().deduplicated,
            ..Default::default()
        };
        for state in inner.states.values() {
            match state {
                LoadState::Loaded => stats.loaded += 1,
                LoadState::Pending => stats.pending += 1,
                LoadState::Failed => stats.failed += 1,
                LoadState::Unseen => {}
            }
        }
        stats
    }

    pub fn dedup_stats(&self) -> DeduplicationStats {
        self.flights.stats()
    }

    /// Release every cached object and forget load history. Pending loads
    /// keep running and repopulate the cache when they finish.
    pub fn clear_cache(&self) -> ClearReport {
        let report = self.cache.clear();
        self.inner.lock().states.retain(|_, state| *state == LoadState::Pending);
        if let Some(placeholders) = &self.placeholders {
            placeholders.clear_colors();
        }
        tracing::info!("image cache cleared: {} released, {} failed", report.released, report.failed);
        report
    }
}
