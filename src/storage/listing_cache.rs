//! Listing cache for the base store
//!
//! Object store listings are the most expensive call the service makes and
//! change only in bursts (imports and environment copies), so listings are
//! cached per tag with a TTL and the whole cache is dropped on a fixed period.
//!
//! The cache is an immutable snapshot behind a lock; readers clone the `Arc`
//! and writers swap in a new map, so an eviction never exposes a half-cleared
//! state.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};

use crate::error::Result;
use crate::types::ObjectMetadata;

/// Listing shared between readers
pub type Listing = Arc<Vec<ObjectMetadata>>;

#[derive(Debug, Clone)]
struct CachedListing {
    objects: Listing,
    created_at: Instant,
}

impl CachedListing {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Cache statistics
#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

/// Snapshot of the cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub ttl_ms: u64,
}

/// Per-tag cache of object listings
pub struct ListingCache {
    snapshot: RwLock<Arc<HashMap<String, CachedListing>>>,
    /// Serializes population so concurrent misses list the store once
    populate_lock: tokio::sync::Mutex<()>,
    /// Bumped by every invalidation; populations started earlier are discarded
    generation: AtomicU64,
    ttl: Duration,
    stats: CacheStats,
}

impl ListingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(HashMap::new())),
            populate_lock: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            ttl,
            stats: CacheStats::default(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lookup(&self, tag: &str) -> Option<Listing> {
        let snapshot = self.snapshot.read().clone();
        snapshot
            .get(tag)
            .filter(|entry| !entry.is_expired(self.ttl))
            .map(|entry| entry.objects.clone())
    }

    /// Return the cached listing for `tag`, running `populate` on a miss
    pub async fn get_or_populate<F, Fut>(&self, tag: &str, populate: F) -> Result<Listing>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<ObjectMetadata>>>,
    {
        if let Some(objects) = self.lookup(tag) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(objects);
        }

        let _guard = self.populate_lock.lock().await;
        // Another reader may have populated while we waited
        if let Some(objects) = self.lookup(tag) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(objects);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let generation = self.generation.load(Ordering::Acquire);
        let objects: Listing = Arc::new(populate().await?);

        let mut snapshot = self.snapshot.write();
        if self.generation.load(Ordering::Acquire) == generation {
            let mut next = HashMap::clone(&snapshot);
            next.insert(
                tag.to_string(),
                CachedListing {
                    objects: objects.clone(),
                    created_at: Instant::now(),
                },
            );
            *snapshot = Arc::new(next);
        }

        Ok(objects)
    }

    /// Drop every cached listing
    pub fn invalidate_all(&self) {
        let mut snapshot = self.snapshot.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        let count = snapshot.len();
        *snapshot = Arc::new(HashMap::new());
        self.stats
            .invalidations
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStatsResponse {
        CacheStatsResponse {
            entries: self.len(),
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            invalidations: self.stats.invalidations.load(Ordering::Relaxed),
            ttl_ms: self.ttl.as_millis() as u64,
        }
    }
}

/// Background task clearing the cache on a fixed period.
///
/// The task is aborted when the handle is stopped or dropped.
pub struct EvictionWorker {
    handle: JoinHandle<()>,
}

impl EvictionWorker {
    /// Start the eviction task; must be called inside a tokio runtime
    pub fn start(cache: Arc<ListingCache>, period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tracing::info!("Emptying find cache");
                cache.invalidate_all();
            }
        });
        tracing::info!("Find cache eviction started (period: {:?})", period);
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for EvictionWorker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
