//! Configuration file parser for newsmux's config.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`,
//! which is useful only with sources passed on the command line. Unknown
//! keys are silently ignored by serde, though we log a warning when the
//! file contains potential typos.
use std::path::Path;
use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;
use thiserror::Error;

use crate::util::{parse_utc_offset, validate_url};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// `default_utc_offset` is not a valid offset string.
    #[error("Invalid UTC offset {0:?} (expected e.g. \"-05:00\")")]
    BadOffset(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified. Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed source URLs, merged in the order listed.
    pub sources: Vec<String>,

    /// Maximum entries taken from any single feed.
    pub per_feed_limit: usize,

    /// Maximum items in the merged result.
    pub total_limit: usize,

    /// Seconds a merged result stays fresh. 0 = refetch on every request.
    pub ttl_seconds: u64,

    /// Per-source HTTP timeout in seconds.
    pub fetch_timeout_seconds: u64,

    /// UTC offset applied to feed dates that carry no zone of their own,
    /// e.g. "-05:00". Upstream publishers tend to emit local wall-clock
    /// times; this names that wall clock.
    pub default_utc_offset: String,

    /// Character budget for plain-text summary excerpts.
    pub excerpt_max_chars: usize,

    /// User-Agent header sent to feed publishers.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            per_feed_limit: 100,
            total_limit: 100,
            ttl_seconds: 600,
            fetch_timeout_seconds: 12,
            default_utc_offset: "+00:00".to_string(),
            excerpt_max_chars: 240,
            user_agent: format!(
                "newsmux/{} (+https://github.com/newsmux/newsmux)",
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged
    ///   as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid slurping a corrupted or
        // runaway file into memory.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "sources",
                "per_feed_limit",
                "total_limit",
                "ttl_seconds",
                "fetch_timeout_seconds",
                "default_utc_offset",
                "excerpt_max_chars",
                "user_agent",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            ttl_seconds = config.ttl_seconds,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// The configured sources that pass URL validation.
    ///
    /// Invalid entries (bad syntax, non-HTTP schemes, private addresses)
    /// are dropped with a warning rather than failing the whole run; the
    /// aggregation is best-effort all the way down.
    pub fn validated_sources(&self) -> Vec<String> {
        self.sources
            .iter()
            .filter(|url| match validate_url(url) {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(source = %url, error = %e, "Dropping invalid feed source");
                    false
                }
            })
            .cloned()
            .collect()
    }

    /// Freshness window for cached results.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Per-source fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    /// The parsed fallback offset for zone-less feed dates.
    pub fn default_offset(&self) -> Result<FixedOffset, ConfigError> {
        parse_utc_offset(&self.default_utc_offset)
            .ok_or_else(|| ConfigError::BadOffset(self.default_utc_offset.clone()))
    }
}

// ============================================================================
// Tests
// ============================================================================
