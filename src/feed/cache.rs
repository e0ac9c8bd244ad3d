use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::feed::normalize::FeedItem;

/// Signature of one aggregation request: the exact ordered source URLs plus
/// both limits. Requests that differ in any of these memoize separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn new(sources: &[String], per_feed_limit: usize, total_limit: usize) -> Self {
        let mut hasher = Sha256::new();
        for source in sources {
            hasher.update(source.as_bytes());
            // Separator prevents ["ab","c"] and ["a","bc"] from colliding
            hasher.update([0u8]);
        }
        hasher.update((per_feed_limit as u64).to_le_bytes());
        hasher.update((total_limit as u64).to_le_bytes());
        CacheKey(hasher.finalize().into())
    }
}

struct Slot {
    items: Arc<Vec<FeedItem>>,
    stored_at: Instant,
}

/// Process-lifetime memoization of merged feed results.
///
/// Each distinct request signature keeps its most recent result; staleness
/// is judged against the caller's freshness window on every read, so there
/// is no background eviction to schedule. The LRU bound is a memory
/// backstop, not a policy; with a handful of configured feed sets it never
/// comes into play.
pub struct ResultCache {
    slots: Mutex<LruCache<CacheKey, Slot>>,
    refresh_guards: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl ResultCache {
    const MAX_KEYS: usize = 64;

    pub fn new() -> Self {
        let capacity = NonZeroUsize::new(Self::MAX_KEYS).expect("MAX_KEYS is non-zero");
        Self {
            slots: Mutex::new(LruCache::new(capacity)),
            refresh_guards: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the stored result for `key` if it is younger than `ttl`.
    ///
    /// A zero `ttl` never hits; that is the on-demand refresh path.
    pub async fn get_fresh(&self, key: &CacheKey, ttl: Duration) -> Option<Arc<Vec<FeedItem>>> {
        if ttl.is_zero() {
            return None;
        }

        let mut slots = self.slots.lock().await;
        match slots.get(key) {
            Some(slot) if slot.stored_at.elapsed() < ttl => Some(Arc::clone(&slot.items)),
            _ => None,
        }
    }

    /// Stores a fresh result under `key`, resetting its age.
    pub async fn store(&self, key: CacheKey, items: Arc<Vec<FeedItem>>) {
        let slot = Slot {
            items,
            stored_at: Instant::now(),
        };
        self.slots.lock().await.put(key, slot);
    }

    /// Returns the per-key refresh lock.
    ///
    /// Holding the lock while refreshing gives at most one in-flight refresh
    /// per key: concurrent misses queue here, then re-check the cache and
    /// find the winner's result.
    pub(crate) async fn refresh_guard(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut guards = self.refresh_guards.lock().await;
        Arc::clone(
            guards
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}
