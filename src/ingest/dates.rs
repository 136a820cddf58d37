// src/ingest/dates.rs
//! Publication-date parsing over the fixed list of formats seen in feeds and APIs.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

/// Offset-bearing formats tried after RFC 2822 / RFC 3339.
const OFFSET_FORMATS: [&str; 3] = [
    "%a, %d %b %Y %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Zone-less formats, interpreted as UTC.
const NAIVE_FORMATS: [&str; 4] = [
    "%a, %d %b %Y %H:%M:%S %Z",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a source date string; `None` when no format matches.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return Utc.timestamp_opt(dt.unix_timestamp(), dt.nanosecond()).single();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
}

/// Parse or fall back to `now`. The flag reports whether the fallback was used.
pub fn published_or_now(raw: Option<&str>, now: DateTime<Utc>) -> (DateTime<Utc>, bool) {
    match raw.and_then(parse_published) {
        Some(dt) => (dt, false),
        None => {
            if let Some(r) = raw.filter(|r| !r.trim().is_empty()) {
                tracing::warn!(raw = r, "unparseable publication date, using now");
            }
            (now, true)
        }
    }
}

/// Unix seconds from JSON APIs (Reddit `created_utc`, Instagram `taken_at`).
pub fn from_unix(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }
    Utc.timestamp_opt(secs as i64, 0).single()
}
