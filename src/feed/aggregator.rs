use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use futures::stream::{self, StreamExt};

use crate::feed::cache::{CacheKey, ResultCache};
use crate::feed::fetcher::fetch_source;
use crate::feed::normalize::{normalize, FeedItem, NormalizeOptions};

/// How many source fetches may be in flight at once.
const FETCH_CONCURRENCY: usize = 4;

/// One aggregation request: which sources to merge and under what caps.
///
/// The same sources in a different order are a different request; the
/// cache keys on the exact ordered set.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Feed source URLs, merged in the order given.
    pub sources: Vec<String>,
    /// Maximum entries taken from any single source.
    pub per_feed_limit: usize,
    /// Maximum items in the merged result.
    pub total_limit: usize,
    /// How long a cached result stays fresh. `Duration::ZERO` bypasses the
    /// cache and forces a refetch.
    pub ttl: Duration,
}

/// Settings applied to every fetch and normalization pass.
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// User-Agent sent to feed publishers.
    pub user_agent: String,
    /// Per-source HTTP timeout.
    pub fetch_timeout: Duration,
    /// Offset applied to feed dates that carry no zone of their own.
    pub default_offset: FixedOffset,
    /// Character budget for plain-text summary excerpts.
    pub excerpt_max_chars: usize,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            user_agent: format!(
                "newsmux/{} (+https://github.com/newsmux/newsmux)",
                env!("CARGO_PKG_VERSION")
            ),
            fetch_timeout: Duration::from_secs(12),
            default_offset: FixedOffset::east_opt(0).expect("zero offset is valid"),
            excerpt_max_chars: 240,
        }
    }
}

/// Merges several RSS/Atom feeds into one deduplicated, recency-sorted
/// stream, memoized behind a TTL cache.
///
/// Aggregation is best-effort: a source that fails to fetch or parse is
/// skipped with a warning, and even all sources failing yields an empty
/// result rather than an error. Partial data beats no data on a news page.
pub struct Aggregator {
    client: reqwest::Client,
    cache: ResultCache,
    fetch_timeout: Duration,
    default_offset: FixedOffset,
    normalize_opts: NormalizeOptions,
}

impl Aggregator {
    /// Builds an aggregator with its own HTTP client and an empty cache.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if the HTTP client cannot be
    /// constructed (e.g. no TLS backend available).
    pub fn new(opts: AggregatorOptions) -> Result<Self, reqwest::Error> {
        Self::with_cache(opts, ResultCache::new())
    }

    /// Builds an aggregator around an existing cache handle.
    ///
    /// The cache is owned state constructed at startup and handed in here;
    /// there is no process-global cache anywhere in the crate.
    pub fn with_cache(opts: AggregatorOptions, cache: ResultCache) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(&opts.user_agent)
            .timeout(opts.fetch_timeout)
            .build()?;

        Ok(Self {
            client,
            cache,
            fetch_timeout: opts.fetch_timeout,
            default_offset: opts.default_offset,
            normalize_opts: NormalizeOptions {
                excerpt_max_chars: opts.excerpt_max_chars,
            },
        })
    }

    /// Produces the merged item sequence for `req`.
    ///
    /// A request within the freshness window returns the cached result with
    /// no network traffic. On a miss, every source is fetched (bounded
    /// concurrency), entries are normalized, duplicates collapse by link
    /// with the later timestamp winning, and the result is sorted
    /// newest-first and truncated to `total_limit`.
    ///
    /// Concurrent misses for the same request signature serialize on a
    /// per-key guard, so at most one refresh is in flight per key.
    pub async fn fetch_combined(&self, req: &MergeRequest) -> Arc<Vec<FeedItem>> {
        let key = CacheKey::new(&req.sources, req.per_feed_limit, req.total_limit);

        if let Some(items) = self.cache.get_fresh(&key, req.ttl).await {
            tracing::debug!(sources = req.sources.len(), items = items.len(), "Cache hit");
            return items;
        }

        let guard = self.cache.refresh_guard(&key).await;
        let _refresh = guard.lock().await;

        // Another caller may have refreshed while we waited for the guard
        if let Some(items) = self.cache.get_fresh(&key, req.ttl).await {
            return items;
        }

        let collected = self.collect(req).await;
        let merged = Arc::new(merge(collected, req.total_limit));
        tracing::info!(
            sources = req.sources.len(),
            items = merged.len(),
            "Merged feed refreshed"
        );

        self.cache.store(key, Arc::clone(&merged)).await;
        merged
    }

    /// Fetches and normalizes every source, concatenating survivors in
    /// source order.
    ///
    /// `buffered` (not `buffer_unordered`) keeps the output in the order
    /// sources were supplied, so encounter order (the dedup and sort
    /// tie-break) is deterministic regardless of which fetch finishes
    /// first.
    async fn collect(&self, req: &MergeRequest) -> Vec<FeedItem> {
        let results: Vec<_> = stream::iter(req.sources.iter())
            .map(|url| {
                let client = &self.client;
                let timeout = self.fetch_timeout;
                let per_feed_limit = req.per_feed_limit;
                let offset = self.default_offset;
                async move {
                    let outcome = fetch_source(client, url, timeout, per_feed_limit, offset).await;
                    (url, outcome)
                }
            })
            .buffered(FETCH_CONCURRENCY)
            .collect()
            .await;

        let mut items = Vec::new();
        for (url, outcome) in results {
            match outcome {
                Ok(raw) => {
                    let feed_title = raw.title;
                    for entry in raw.entries {
                        if let Some(item) =
                            normalize(entry, feed_title.as_deref(), &self.normalize_opts)
                        {
                            items.push(item);
                        }
                    }
                }
                // One bad source never takes down the aggregation
                Err(e) => tracing::warn!(source = %url, error = %e, "Skipping feed source"),
            }
        }
        items
    }
}

/// Collapses duplicate links and orders the result newest-first.
///
/// When two items share a link the one with the later `published_at` wins;
/// an item without a timestamp loses to any timestamped duplicate. The
/// winner keeps the loser's (earlier) encounter position, and the final
/// stable sort puts undated items after all dated ones.
fn merge(items: Vec<FeedItem>, total_limit: usize) -> Vec<FeedItem> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<FeedItem> = Vec::new();

    for item in items {
        match position.entry(item.link.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push(item);
            }
            Entry::Occupied(slot) => {
                let existing = &mut merged[*slot.get()];
                // `None < Some(_)`: a dated duplicate beats an undated one
                if item.published_at > existing.published_at {
                    *existing = item;
                }
            }
        }
    }

    merged.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    merged.truncate(total_limit);
    merged
}
