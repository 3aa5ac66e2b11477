//! Readiness checks with simple caching.
//!
//! Each readiness check would otherwise ping Postgres and NATS. Results are
//! cached for a fixed duration so frequent checks cost an atomic load.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use axum::extract::FromRef;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::queue::FetchQueue;
use crate::store::ContentStore;

/// Tracing target for health checks.
const TRACING_TARGET_HEALTH: &str = "pulse_server::service::health";

/// Default cache duration for health checks.
const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(30);

/// Connectivity of the service dependencies.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Whether the store answered a ping.
    pub store: bool,
    /// Whether the queue answered a ping.
    pub queue: bool,
}

impl HealthReport {
    /// Returns whether every dependency is reachable.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.store && self.queue
    }
}

#[derive(Debug)]
struct HealthCacheEntry {
    store: AtomicBool,
    queue: AtomicBool,
    /// `None` until the first check.
    last_check: RwLock<Option<Instant>>,
    cache_duration: Duration,
}

impl HealthCacheEntry {
    fn new(cache_duration: Duration) -> Self {
        Self {
            store: AtomicBool::new(false),
            queue: AtomicBool::new(false),
            last_check: RwLock::new(None),
            cache_duration,
        }
    }

    fn cached(&self) -> HealthReport {
        HealthReport {
            store: self.store.load(Ordering::Relaxed),
            queue: self.queue.load(Ordering::Relaxed),
        }
    }

    async fn get_or_update<F, Fut>(&self, check_fn: F) -> HealthReport
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HealthReport>,
    {
        let now = Instant::now();
        let last_check = { *self.last_check.read().await };

        if let Some(last_check) = last_check
            && now.duration_since(last_check) < self.cache_duration
        {
            return self.cached();
        }

        let report = check_fn().await;

        self.store.store(report.store, Ordering::Relaxed);
        self.queue.store(report.queue, Ordering::Relaxed);
        *self.last_check.write().await = Some(now);

        report
    }

    async fn invalidate(&self) {
        *self.last_check.write().await = None;
    }
}

/// Cached readiness of the store and the queue.
///
/// Clones share the same cache.
#[derive(Debug, Clone)]
pub struct HealthCache {
    cache: Arc<HealthCacheEntry>,
}

impl HealthCache {
    /// Creates a cache with the default duration of 30 seconds.
    pub fn new() -> Self {
        Self::with_cache_duration(DEFAULT_CACHE_DURATION)
    }

    /// Creates a cache with a custom duration.
    pub fn with_cache_duration(cache_duration: Duration) -> Self {
        tracing::debug!(
            target: TRACING_TARGET_HEALTH,
            cache_duration_secs = cache_duration.as_secs(),
            "Health cache initialized"
        );

        Self {
            cache: Arc::new(HealthCacheEntry::new(cache_duration)),
        }
    }

    /// Returns the cached report, checking both dependencies when it expired.
    pub async fn check<S>(&self, state: &S) -> HealthReport
    where
        Arc<dyn ContentStore>: FromRef<S>,
        Arc<dyn FetchQueue>: FromRef<S>,
    {
        let store = <Arc<dyn ContentStore>>::from_ref(state);
        let queue = <Arc<dyn FetchQueue>>::from_ref(state);

        self.cache
            .get_or_update(|| check_all_components(store, queue))
            .await
    }

    /// Returns the last report without checking anything.
    pub fn get_cached(&self) -> HealthReport {
        self.cache.cached()
    }

    /// Forces the next [`check`](Self::check) to ping both dependencies.
    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
        tracing::debug!(target: TRACING_TARGET_HEALTH, "Health cache invalidated");
    }
}

impl Default for HealthCache {
    fn default() -> Self {
        Self::new()
    }
}

#[tracing::instrument(skip_all, target = TRACING_TARGET_HEALTH)]
async fn check_all_components(
    store: Arc<dyn ContentStore>,
    queue: Arc<dyn FetchQueue>,
) -> HealthReport {
    let start = Instant::now();
    let (store, queue) = tokio::join!(store.ping(), queue.ping());
    let report = HealthReport { store, queue };

    if report.is_ready() {
        tracing::debug!(
            target: TRACING_TARGET_HEALTH,
            duration_ms = start.elapsed().as_millis(),
            "Health check passed"
        );
    } else {
        tracing::warn!(
            target: TRACING_TARGET_HEALTH,
            duration_ms = start.elapsed().as_millis(),
            store_healthy = report.store,
            queue_healthy = report.queue,
            "Health check failed"
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueue;
    use crate::store::MemoryStore;

    struct Deps {
        store: Arc<MemoryStore>,
        queue: Arc<MemoryQueue>,
    }

    impl FromRef<Deps> for Arc<dyn ContentStore> {
        fn from_ref(deps: &Deps) -> Self {
            deps.store.clone()
        }
    }

    impl FromRef<Deps> for Arc<dyn FetchQueue> {
        fn from_ref(deps: &Deps) -> Self {
            deps.queue.clone()
        }
    }

    fn deps() -> Deps {
        Deps {
            store: Arc::new(MemoryStore::new()),
            queue: Arc::new(MemoryQueue::new()),
        }
    }

    #[tokio::test]
    async fn caches_until_invalidated() {
        let deps = deps();
        let cache = HealthCache::new();

        assert!(cache.check(&deps).await.is_ready());

        deps.queue.set_offline(true);
        assert!(cache.check(&deps).await.is_ready());

        cache.invalidate().await;
        let report = cache.check(&deps).await;
        assert!(report.store);
        assert!(!report.queue);
        assert_eq!(cache.get_cached(), report);
    }

    #[tokio::test]
    async fn zero_duration_always_checks() {
        let deps = deps();
        let cache = HealthCache::with_cache_duration(Duration::ZERO);

        assert!(cache.check(&deps).await.is_ready());
        deps.store.set_failing(true);
        assert!(!cache.check(&deps).await.store);
    }
}
