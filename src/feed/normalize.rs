use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::feed::parser::RawEntry;
use crate::util::{decode_and_trim, excerpt, strip_html};

/// Label used when neither the feed title nor the link host is usable.
const FALLBACK_SOURCE: &str = "Feed";

/// First `<img src="...">` in an HTML fragment, either quote style.
static IMG_SRC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).unwrap());

/// One canonical item in a merged feed.
///
/// Built fresh on every aggregation pass; it has no persistent identity and
/// lives only inside an aggregation result and its cache entry. `link` is
/// the item's identity for deduplication.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    /// Entity-decoded, trimmed display title. Never empty.
    pub title: String,
    /// Canonical article URL; dedup key. Never empty.
    pub link: String,
    /// Representative image, if the entry carried one in any of the
    /// supported shapes.
    pub image_url: Option<String>,
    /// Publication instant in UTC. `None` when the source supplied no
    /// parseable date.
    pub published_at: Option<DateTime<Utc>>,
    /// Human-readable origin: feed title, else link host, else "Feed".
    pub source_label: String,
    /// Plain-text excerpt of the summary, capped at the configured budget.
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct NormalizeOptions {
    /// Character budget for the plain-text summary excerpt.
    pub excerpt_max_chars: usize,
}

/// Converts one raw entry into a [`FeedItem`].
///
/// Returns `None` for entries with no usable title or link; everything else
/// degrades to an absent field rather than a rejection.
pub(crate) fn normalize(
    entry: RawEntry,
    feed_title: Option<&str>,
    opts: &NormalizeOptions,
) -> Option<FeedItem> {
    let title = decode_and_trim(entry.title.as_deref()?).into_owned();
    if title.is_empty() {
        return None;
    }

    let link = entry.link.as_deref()?.trim().to_string();
    if link.is_empty() {
        return None;
    }

    let image_url = extract_image(&entry);
    let published_at = entry.published.or(entry.updated);
    let source_label = source_label(feed_title, &link);

    let summary = entry
        .summary_html
        .as_deref()
        .or(entry.content_html.as_deref())
        .map(|html| excerpt(&strip_html(html), opts.excerpt_max_chars))
        .filter(|s| !s.is_empty());

    Some(FeedItem {
        title,
        link,
        image_url,
        published_at,
        source_label,
        summary,
    })
}

/// Image fallback chain: structured media attachment, then thumbnail, then
/// the first `<img>` sniffed out of the entry body. Absence is not an error.
///
/// RSS enclosures arrive merged into the media attachments, so the first
/// step filters on an `image/*` (or missing) MIME type to avoid picking up
/// podcast audio or video enclosures.
fn extract_image(entry: &RawEntry) -> Option<String> {
    let attached = entry.media.iter().find(|m| {
        !m.url.is_empty() && m.mime.as_deref().is_none_or(|t| t.starts_with("image/"))
    });
    if let Some(media) = attached {
        return Some(media.url.clone());
    }

    if let Some(thumb) = entry.thumbnails.iter().find(|t| !t.is_empty()) {
        return Some(thumb.clone());
    }

    let html = entry
        .content_html
        .as_deref()
        .or(entry.summary_html.as_deref())?;
    IMG_SRC_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn source_label(feed_title: Option<&str>, link: &str) -> String {
    if let Some(title) = feed_title {
        let title = title.trim();
        if !title.is_empty() {
            return title.to_string();
        }
    }

    Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| FALLBACK_SOURCE.to_string())
}
