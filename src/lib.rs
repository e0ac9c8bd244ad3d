//! newsmux merges several RSS/Atom feeds into one deduplicated,
//! recency-sorted stream of news items.
//!
//! The pipeline: each configured source is fetched with a bounded timeout
//! and parsed tolerantly; entries are normalized into [`FeedItem`]s (title,
//! link, image, timestamp, source label, excerpt); duplicates collapse by
//! link with the later timestamp winning; the merged result is sorted
//! newest-first, capped, and memoized behind a TTL cache keyed on the
//! request signature.
//!
//! Failures degrade instead of propagating: a source that cannot be fetched
//! or parsed is skipped, an entry without a usable title or link is dropped,
//! and a pass where everything fails yields an empty result. The consumer
//! renders "no items" instead of an error page, which is the right posture
//! for a best-effort news page.
//!
//! ```no_run
//! use std::time::Duration;
//! use newsmux::{Aggregator, AggregatorOptions, MergeRequest};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let aggregator = Aggregator::new(AggregatorOptions::default())?;
//! let items = aggregator
//!     .fetch_combined(&MergeRequest {
//!         sources: vec!["https://news.example.com/crime.rss".to_string()],
//!         per_feed_limit: 20,
//!         total_limit: 40,
//!         ttl: Duration::from_secs(300),
//!     })
//!     .await;
//! for item in items.iter() {
//!     println!("{} — {}", item.source_label, item.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod feed;
pub mod util;

pub use config::{Config, ConfigError};
pub use feed::{Aggregator, AggregatorOptions, FeedItem, FetchError, MergeRequest, ResultCache};
