use std::borrow::Cow;

use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;

/// Ellipsis appended to truncated excerpts.
const ELLIPSIS: char = '…';

/// Matches any HTML/XML tag, including multi-line ones.
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// Reduces an HTML fragment to collapsed plain text.
///
/// Tags are replaced with spaces (so `word<br>word` does not fuse), HTML
/// entities are decoded, and all whitespace runs collapse to single spaces.
/// Feed summaries arrive as markup of wildly varying quality; this is a
/// display transformation, not a sanitizer.
pub fn strip_html(html: &str) -> String {
    let without_tags = TAG_RE.replace_all(html, " ");
    let decoded = decode_html_entities(without_tags.as_ref());
    collapse_whitespace(&decoded)
}

/// Decodes HTML entities and trims surrounding whitespace.
///
/// Returns `Cow::Borrowed` when the input needs no rewriting (common case
/// for plain ASCII titles).
pub fn decode_and_trim(s: &str) -> Cow<'_, str> {
    match decode_html_entities(s) {
        Cow::Borrowed(b) => Cow::Borrowed(b.trim()),
        Cow::Owned(o) => Cow::Owned(o.trim().to_string()),
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Caps text at `max_chars` characters without splitting words.
///
/// Text at or under the budget is returned untouched. Otherwise the text is
/// cut at the last word boundary before the budget (hard cut if the prefix
/// is a single unbroken word) and `…` is appended, so the result is at most
/// `max_chars + 1` characters.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    // Byte offset of the character one past the budget; `None` means the
    // text already fits.
    let cut = match text.char_indices().nth(max_chars) {
        None => return text.to_string(),
        Some((idx, _)) => idx,
    };

    let head = &text[..cut];
    let kept = match head.rfind(char::is_whitespace) {
        Some(ws) => head[..ws].trim_end(),
        None => head,
    };

    let mut out = String::with_capacity(kept.len() + ELLIPSIS.len_utf8());
    out.push_str(kept);
    out.push(ELLIPSIS);
    out
}
