// src/ingest/mod.rs
pub mod config;
pub mod dates;
pub mod feed;
pub mod http;
pub mod pipeline;
pub mod providers;
pub mod scheduler;
pub mod thumbnail;
pub mod types;

use crate::model::ContentCandidate;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashSet;

/// Description cap, measured after markup is stripped.
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "discovery_candidates_total",
            "Candidates produced by source adapters."
        );
        describe_counter!(
            "discovery_feed_entries_total",
            "Entries read from RSS/Atom feeds."
        );
        describe_counter!("discovery_unique_total", "Candidates left after URL dedup.");
        describe_counter!(
            "discovery_recent_total",
            "Candidates inside the discovery window."
        );
        describe_counter!(
            "discovery_relevant_total",
            "Candidates accepted by relevance or priority bypass."
        );
        describe_counter!("discovery_saved_total", "New content items stored.");
        describe_counter!(
            "discovery_skipped_total",
            "Candidates whose URL was already stored."
        );
        describe_counter!(
            "discovery_source_errors_total",
            "Source fetch failures after retries."
        );
        describe_counter!(
            "discovery_persist_errors_total",
            "Per-item persistence failures."
        );
        describe_counter!(
            "discovery_linked_total",
            "New links between tracked entities and content items."
        );
        describe_counter!(
            "discovery_timeouts_total",
            "Platform runs abandoned at the wall-clock timeout."
        );
        describe_histogram!("discovery_fetch_ms", "Source HTTP fetch time in milliseconds.");
        describe_histogram!("discovery_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "discovery_last_run_ts",
            "Unix ts when a discovery run last finished."
        );
    });
}

fn tag_regex() -> &'static Regex {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    RE_TAGS.get_or_init(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>|</?[^>]+>").unwrap())
}

fn ws_regex() -> &'static Regex {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Strip markup, decode entities and collapse whitespace.
pub fn clean_text(s: &str) -> String {
    // Entities are decoded twice: feeds often double-escape markup (`&lt;p&gt;`).
    let decoded = html_escape::decode_html_entities(s);
    let out = tag_regex().replace_all(&decoded, " ");
    let out = html_escape::decode_html_entities(&out).to_string();
    let out = tag_regex().replace_all(&out, " ");
    ws_regex().replace_all(&out, " ").trim().to_string()
}

/// `clean_text` capped at `DESCRIPTION_MAX_CHARS` characters.
pub fn clean_description(s: &str) -> String {
    truncate_chars(&clean_text(s), DESCRIPTION_MAX_CHARS)
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect()
    } else {
        s.to_string()
    }
}

/// Resolve a link against the document it came from. Absolute http(s) links
/// are returned verbatim.
pub fn resolve_link(link: &str, base: Option<&str>) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    let lower = link.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(link.to_string());
    }
    let base = url::Url::parse(base?).ok()?;
    let joined = base.join(link).ok()?;
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}

/// First-seen-wins dedup by exact canonical URL. Returns (kept, dropped).
pub fn dedupe_by_url(candidates: Vec<ContentCandidate>) -> (Vec<ContentCandidate>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(candidates.len());
    let mut keep = Vec::with_capacity(candidates.len());
    let mut dropped = 0usize;
    for c in candidates {
        if seen.insert(c.canonical_url.clone()) {
            keep.push(c);
        } else {
            dropped += 1;
        }
    }
    (keep, dropped)
}
