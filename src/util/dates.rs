use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Date formats seen in the wild that carry no zone or offset.
///
/// Mostly RFC 2822 with the zone dropped, plus ISO-ish variants some CMSes
/// emit in `<pubDate>`.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Date-only fallbacks, normalized to midnight.
const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%a, %d %b %Y", "%d %b %Y"];

/// Leniently parses a feed timestamp string.
///
/// Tries RFC 3339, then RFC 2822, then a set of common zone-less formats.
/// A timestamp with an explicit zone or offset is converted to UTC; one
/// without is interpreted in `default_offset`. Upstream feeds routinely
/// emit local wall-clock times with the offset dropped, so the operator
/// picks which wall clock that is.
///
/// Unparseable input yields `None`, never an error.
pub fn parse_timestamp(raw: &str, default_offset: FixedOffset) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return in_offset(naive, default_offset);
        }
    }
    for fmt in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return in_offset(date.and_hms_opt(0, 0, 0)?, default_offset);
        }
    }

    None
}

fn in_offset(naive: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    // A fixed offset has no DST gaps, so this resolves to a single instant.
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parses a UTC offset string like `"-05:00"`, `"+09:30"`, or `"Z"`.
pub fn parse_utc_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    if s.is_empty() || s == "Z" || s == "z" {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
