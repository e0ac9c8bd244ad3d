//! Utility functions shared across the aggregation pipeline.
//!
//! - **Text processing**: HTML-to-plain-text reduction and word-boundary
//!   excerpting for feed summaries
//! - **Date parsing**: lenient timestamp parsing with a configurable
//!   fallback offset for zone-less feed dates
//! - **URL validation**: security-focused validation of configured feed
//!   source URLs

mod dates;
mod text;
mod url_validator;

pub use dates::{parse_timestamp, parse_utc_offset};
pub use text::{decode_and_trim, excerpt, strip_html};
pub use url_validator::{validate_url, UrlValidationError};
