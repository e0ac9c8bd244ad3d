use std::time::Duration;

use chrono::FixedOffset;
use futures::StreamExt;
use thiserror::Error;

use crate::feed::parser::{parse_feed, RawFeed};

const MAX_RETRIES: u32 = 3;
const MAX_FEED_SIZE: usize = 4 * 1024 * 1024; // 4MB

/// Errors that can occur while fetching and parsing one feed source.
///
/// None of these cross the aggregator boundary: a failed source is logged
/// and skipped, and the merged result is built from whatever succeeded.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Document could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Fetches one feed source and parses it into a [`RawFeed`].
///
/// The request carries the aggregator's User-Agent and is bounded by
/// `timeout`. Rate limiting (429) and server errors (5xx) retry with
/// exponential backoff up to [`MAX_RETRIES`] times; other non-success
/// statuses fail immediately. Entries beyond `per_feed_limit` are dropped
/// before normalization.
pub(crate) async fn fetch_source(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    per_feed_limit: usize,
    default_offset: FixedOffset,
) -> Result<RawFeed, FetchError> {
    let mut retry_count = 0;

    let bytes = loop {
        let response = tokio::time::timeout(timeout, client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            if retry_count >= MAX_RETRIES {
                return Err(FetchError::RateLimited(MAX_RETRIES));
            }

            let delay_secs = 2u64.pow(retry_count); // 2s, 4s, 8s
            tracing::warn!(
                source = %url,
                retry = retry_count,
                delay_secs = delay_secs,
                "Rate limited, backing off"
            );
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            retry_count += 1;
            continue;
        }

        if response.status().is_server_error() {
            if retry_count >= MAX_RETRIES {
                return Err(FetchError::HttpStatus(response.status().as_u16()));
            }

            let delay_secs = 2u64.pow(retry_count);
            tracing::warn!(
                source = %url,
                status = %response.status(),
                retry = retry_count,
                delay_secs = delay_secs,
                "Server error, retrying after delay"
            );
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            retry_count += 1;
            continue;
        }

        // 4xx and other non-success statuses fail immediately
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        break read_limited_bytes(response, MAX_FEED_SIZE).await?;
    };

    let mut feed = parse_feed(&bytes, default_offset).map_err(|e| FetchError::Parse(e.to_string()))?;

    if feed.entries.len() > per_feed_limit {
        tracing::debug!(
            source = %url,
            entries = feed.entries.len(),
            kept = per_feed_limit,
            "Truncating oversized feed"
        );
        feed.entries.truncate(per_feed_limit);
    }

    Ok(feed)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: reject on Content-Length before reading anything
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
