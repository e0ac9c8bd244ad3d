use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use feed_rs::parser;

use crate::util::parse_timestamp;

/// One parsed feed document, reduced to the fields the normalizer consumes.
///
/// This is the only shape downstream code sees; the `feed-rs` model stays
/// contained in this module.
#[derive(Debug, Clone)]
pub(crate) struct RawFeed {
    /// Feed-level title, used as the source label when present.
    pub title: Option<String>,
    pub entries: Vec<RawEntry>,
}

/// One feed entry before normalization. Every field is optional; the
/// normalizer decides what survives.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    /// Media attachments and RSS enclosures, in document order.
    pub media: Vec<RawMedia>,
    /// Media thumbnail URLs, in document order.
    pub thumbnails: Vec<String>,
    pub summary_html: Option<String>,
    pub content_html: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct RawMedia {
    pub url: String,
    pub mime: Option<String>,
}

/// Parses an RSS/Atom document into a [`RawFeed`].
///
/// `feed-rs` tolerates most of the malformed XML real-world feeds publish.
/// Its built-in timestamp parsing is replaced with [`parse_timestamp`] so
/// zone-less dates resolve in `default_offset` instead of being dropped.
pub(crate) fn parse_feed(bytes: &[u8], default_offset: FixedOffset) -> Result<RawFeed> {
    let feed = parser::Builder::new()
        .timestamp_parser(move |raw: &str| parse_timestamp(raw, default_offset))
        .build()
        .parse(bytes)?;

    let title = feed.title.map(|t| t.content);
    let entries = feed.entries.into_iter().map(raw_entry).collect();

    Ok(RawFeed { title, entries })
}

fn raw_entry(entry: feed_rs::model::Entry) -> RawEntry {
    // Atom marks the canonical page link rel="alternate"; RSS links come
    // through with no rel at all, so fall back to the first link.
    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.clone());

    let mut media = Vec::new();
    let mut thumbnails = Vec::new();
    for object in entry.media {
        for content in object.content {
            if let Some(url) = content.url {
                media.push(RawMedia {
                    url: url.to_string(),
                    mime: content.content_type.map(|ct| ct.to_string()),
                });
            }
        }
        thumbnails.extend(object.thumbnails.into_iter().map(|t| t.image.uri));
    }

    RawEntry {
        title: entry.title.map(|t| t.content),
        link,
        published: entry.published,
        updated: entry.updated,
        media,
        thumbnails,
        summary_html: entry.summary.map(|s| s.content),
        content_html: entry.content.and_then(|c| c.body),
    }
}
