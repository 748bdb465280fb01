//! Request Deduplication
//!
//! Single-flight execution: concurrent callers asking for the same key share
//! one underlying operation and all observe its result.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use smol::Task;

/// Result of a single-flight call
#[derive(Debug, Clone)]
pub struct Flight<V> {
    pub value: V,
    /// True if this caller joined an operation started by someone else
    pub was_deduplicated: bool,
}

/// Statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct DeduplicationStats {
    pub total_requests: u64,
    pub deduplicated: u64,
    pub unique: u64,
}

impl DeduplicationStats {
    pub fn dedup_rate(&self) -> f64 {
        if self.total_requests == 0 { 0.0 }
        else { self.deduplicated as f64 / self.total_requests as f64 }
    }
}

/// Single-flight deduplicator keyed by `K`.
///
/// The operation runs as a spawned task, so it always completes even if every
/// caller stops waiting. The in-flight entry is removed when it completes.
pub struct SingleFlight<K, V> {
    inflight: Arc<Mutex<HashMap<K, Shared<Task<V>>>>>,
    stats: Arc<Mutex<DeduplicationStats>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(Mutex::new(DeduplicationStats::default())),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `make()` for `key` unless an operation for `key` is already in
    /// flight, in which case wait for that one instead.
    ///
    /// `make` is called with the in-flight table locked and must not call
    /// back into this deduplicator.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> Flight<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (shared, was_deduplicated) = {
            let mut inflight = self.inflight.lock();
            let mut stats = self.stats.lock();
            stats.total_requests += 1;

            if let Some(existing) = inflight.get(&key) {
                stats.deduplicated += 1;
                (existing.clone(), true)
            } else {
                stats.unique += 1;
                let table = Arc::clone(&self.inflight);
                let done_key = key.clone();
                let operation = make();
                // The spawned task cannot remove its entry before the insert
                // below because it needs this same lock.
                let task = smol::spawn(async move {
                    let value = operation.await;
                    table.lock().remove(&done_key);
                    value
                });
                let shared = task.shared();
                inflight.insert(key, shared.clone());
                (shared, false)
            }
        };

        Flight {
            value: shared.await,
            was_deduplicated,
        }
    }

    /// Check if an operation for `key` is in flight
    pub fn is_pending(&self, key: &K) -> bool {
        self.inflight.lock().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.inflight.lock().len()
    }

    pub fn stats(&self) -> DeduplicationStats {
        *self.stats.lock()
    }
}
