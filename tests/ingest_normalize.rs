// tests/ingest_normalize.rs
//
// Normalization helpers shared by every adapter: markup cleanup, link
// resolution, date fallback, in-run dedup and the side-channel note format.

use chrono::{TimeZone, Utc};
use fitness_discovery::ingest::dates::{from_unix, parse_published, published_or_now};
use fitness_discovery::ingest::{clean_description, clean_text, dedupe_by_url, resolve_link, DESCRIPTION_MAX_CHARS};
use fitness_discovery::model::{ContentCandidate, Platform, SideChannel};

#[test]
fn markup_and_entities_are_flattened() {
    assert_eq!(clean_text("<p>Roxzone&nbsp;tips &amp; <b>tricks</b></p>"), "Roxzone tips & tricks");
    assert_eq!(clean_text("&lt;p&gt;Escaped&lt;/p&gt;   twice"), "Escaped twice");
    assert_eq!(clean_text("<script>alert(1)</script>Clean"), "Clean");
}

#[test]
fn description_is_capped_after_stripping() {
    let long = format!("<div>{}</div>", "a".repeat(DESCRIPTION_MAX_CHARS + 50));
    let out = clean_description(&long);
    assert_eq!(out.chars().count(), DESCRIPTION_MAX_CHARS);
    assert!(!out.contains('<'));
}

#[test]
fn relative_links_resolve_and_absolute_links_stay_verbatim() {
    let base = Some("https://hyrox.test/blog/feed/");
    assert_eq!(resolve_link("/2025/recap", base).as_deref(), Some("https://hyrox.test/2025/recap"));
    assert_eq!(
        resolve_link("https://Other.test/A?utm=1", base).as_deref(),
        Some("https://Other.test/A?utm=1")
    );
    assert_eq!(resolve_link("  ", base), None);
    assert_eq!(resolve_link("/relative", None), None);
    assert_eq!(resolve_link("mailto:x@y.test", base), None);
}

#[test]
fn dates_parse_common_formats_and_fall_back_to_now() {
    let expected = Utc.with_ymd_and_hms(2025, 1, 6, 10, 0, 0).unwrap();
    assert_eq!(parse_published("Mon, 06 Jan 2025 10:00:00 GMT"), Some(expected));
    assert_eq!(parse_published("2025-01-06T10:00:00Z"), Some(expected));
    assert_eq!(parse_published("2025-01-06T11:00:00+01:00"), Some(expected));

    let now = Utc.with_ymd_and_hms(2025, 1, 8, 0, 0, 0).unwrap();
    assert_eq!(published_or_now(Some("next tuesday"), now), (now, true));
    assert_eq!(published_or_now(None, now), (now, true));
    assert_eq!(published_or_now(Some("2025-01-06T10:00:00Z"), now), (expected, false));

    assert_eq!(from_unix(1_736_157_600.0), Some(expected));
    assert_eq!(from_unix(0.0), None);
}

#[test]
fn dedup_keeps_first_seen_values() {
    let now = Utc::now();
    let mut first = ContentCandidate::new(Platform::Article, "BoxRox", "Original title", "https://x.test/a", now);
    first.description = "first".into();
    let mut drifted = ContentCandidate::new(Platform::Article, "BoxRox", "Edited title", "https://x.test/a", now);
    drifted.description = "second".into();
    let other = ContentCandidate::new(Platform::Article, "BoxRox", "Other", "https://x.test/b", now);

    let (kept, dropped) = dedupe_by_url(vec![first, drifted, other]);
    assert_eq!(dropped, 1);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].title, "Original title");
    assert_eq!(kept[0].description, "first");
}

#[test]
fn side_channel_reads_legacy_notes() {
    let sc = SideChannel::from_note("Author: Sam | Spotify: https://open.spotify.com/x | Junk | Mood: great");
    assert_eq!(sc.author.as_deref(), Some("Sam"));
    assert_eq!(sc.spotify_url.as_deref(), Some("https://open.spotify.com/x"));
    assert!(sc.apple_url.is_none());
    assert_eq!(
        sc.to_note().as_deref(),
        Some("Author: Sam | Spotify: https://open.spotify.com/x")
    );
    assert_eq!(SideChannel::default().to_note(), None);
}
