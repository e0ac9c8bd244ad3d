//! The feed aggregation pipeline: fetch, normalize, merge, cache.
//!
//! The modules mirror the stages data flows through:
//!
//! - [`parser`] - tolerant RSS/Atom parsing into a raw optional-field shape
//! - [`fetcher`] - HTTP retrieval with timeout, size cap, and retry logic
//! - [`normalize`] - raw entries become canonical [`FeedItem`]s or are dropped
//! - [`aggregator`] - multi-source fan-out, link dedup, recency sort
//! - [`cache`] - TTL memoization of merged results per request signature
//!
//! Only [`Aggregator`] and the types on its surface are public; the raw
//! entry shape stays inside the pipeline.

mod aggregator;
mod cache;
mod fetcher;
mod normalize;
mod parser;

pub use aggregator::{Aggregator, AggregatorOptions, MergeRequest};
pub use cache::{CacheKey, ResultCache};
pub use fetcher::FetchError;
pub use normalize::FeedItem;
