// src/ingest/providers/rss.rs
//! RSS/Atom adapter for article publications and podcast feeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;

use crate::ingest::dates::published_or_now;
use crate::ingest::feed::{parse_feed, FeedEntry};
use crate::ingest::http::{FetchError, HttpClient};
use crate::ingest::providers::google_news::resolve_article_url;
use crate::ingest::providers::parse_clock_duration;
use crate::ingest::thumbnail::fetch_meta_image;
use crate::ingest::types::{SourceAdapter, SourceTarget};
use crate::ingest::{clean_description, clean_text, resolve_link};
use crate::model::{ContentCandidate, CreatorHint, Platform, SideChannel};

/// One feed entry plus the channel-level fields it may fall back to.
#[derive(Debug, Clone)]
pub struct FeedRecord {
    pub entry: FeedEntry,
    pub feed_title: Option<String>,
    pub feed_link: Option<String>,
    pub feed_author: Option<String>,
    pub feed_image: Option<String>,
}

pub struct FeedAdapter {
    http: HttpClient,
    platform: Platform,
    fetch_thumbnails: bool,
}

impl FeedAdapter {
    pub fn articles(http: HttpClient, fetch_thumbnails: bool) -> Self {
        Self {
            http,
            platform: Platform::Article,
            fetch_thumbnails,
        }
    }

    pub fn podcasts(http: HttpClient) -> Self {
        Self {
            http,
            platform: Platform::Podcast,
            fetch_thumbnails: false,
        }
    }

    /// Parse an already-fetched document; used by `fetch` and by tests.
    pub fn records_from_str(xml: &str, limit: usize) -> Result<Vec<FeedRecord>, FetchError> {
        let feed = parse_feed(xml)?;
        let total = feed.entries.len();
        let records: Vec<FeedRecord> = feed
            .entries
            .into_iter()
            .take(limit)
            .map(|entry| FeedRecord {
                entry,
                feed_title: feed.title.clone(),
                feed_link: feed.link.clone(),
                feed_author: feed.author.clone(),
                feed_image: feed.image.clone(),
            })
            .collect();
        if total > records.len() {
            tracing::debug!(total, kept = records.len(), "feed entries capped");
        }
        Ok(records)
    }

    fn source_name(&self, rec: &FeedRecord, target: &SourceTarget) -> String {
        match self.platform {
            // Podcasts are attributed to the show, whatever the configured label.
            Platform::Podcast => rec
                .feed_title
                .as_deref()
                .map(clean_text)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| target.name.clone()),
            // Aggregated news items name their publisher.
            _ => rec
                .entry
                .publisher
                .as_deref()
                .map(clean_text)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| target.name.clone()),
        }
    }
}

/// Feed URL for a priority source: Substack/newsletter and bare homepages get `/feed`.
pub fn priority_feed_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let lower = trimmed.to_ascii_lowercase();
    let looks_like_feed = lower.contains("/feed")
        || lower.contains("/rss")
        || lower.ends_with(".xml")
        || lower.contains("atom");
    if looks_like_feed {
        return url.trim().to_string();
    }
    if lower.contains("substack.com") || lower.contains("newsletter") || trimmed.matches('/').count() <= 3 {
        return format!("{trimmed}/feed");
    }
    url.trim().to_string()
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    type Raw = FeedRecord;

    fn name(&self) -> &'static str {
        match self.platform {
            Platform::Podcast => "podcast-rss",
            _ => "article-rss",
        }
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch(&self, target: &SourceTarget) -> Result<Vec<FeedRecord>, FetchError> {
        let body = self.http.get_text(&target.locator, &[], &[]).await?;
        let records = Self::records_from_str(&body, target.limit)?;
        counter!("discovery_feed_entries_total", "platform" => self.platform.as_str()).increment(records.len() as u64);
        Ok(records)
    }

    fn normalize(&self, rec: FeedRecord, target: &SourceTarget, now: DateTime<Utc>) -> Option<ContentCandidate> {
        let title = rec.entry.title.as_deref().map(clean_text).filter(|t| !t.is_empty())?;
        let base = Some(target.locator.as_str());
        let url = rec
            .entry
            .link
            .as_deref()
            .and_then(|l| resolve_link(l, base))
            .or_else(|| rec.entry.guid.as_deref().and_then(|g| resolve_link(g, None)))?;
        let url = resolve_article_url(&url);

        let (published_at, inferred) = published_or_now(rec.entry.date(), now);
        let source_name = self.source_name(&rec, target);

        let mut c = ContentCandidate::new(self.platform, source_name.clone(), title, url, published_at);
        c.published_at_inferred = inferred;
        c.description = rec.entry.summary().map(clean_description).unwrap_or_default();
        c.thumbnail_url = rec
            .entry
            .thumbnail
            .as_deref()
            .or(rec.feed_image.as_deref().filter(|_| self.platform == Platform::Podcast))
            .and_then(|t| resolve_link(t, base));
        c.duration_seconds = rec.entry.duration.as_deref().and_then(parse_clock_duration);
        c.is_priority = target.marks_priority();
        c.category_hint = target.category;

        c.creator = CreatorHint {
            name: source_name.clone(),
            profile_url: rec.feed_link.as_deref().and_then(|l| resolve_link(l, base)),
            avatar_url: rec.feed_image.clone(),
            ..CreatorHint::default()
        };

        let author = rec
            .entry
            .author
            .as_deref()
            .or(rec.feed_author.as_deref())
            .map(clean_text)
            .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case(&source_name));
        c.side_channel = SideChannel {
            author,
            external_url: rec.entry.audio_url.clone(),
            ..SideChannel::default()
        };
        Some(c)
    }

    async fn enrich(&self, candidate: &mut ContentCandidate) {
        if self.fetch_thumbnails && candidate.thumbnail_url.is_none() {
            candidate.thumbnail_url = fetch_meta_image(&self.http, &candidate.canonical_url).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FEED: &str = r#"<rss><channel><title>Hyrox Official</title><link>https://hyrox.test/</link>
      <item><title>  Hyrox   World Championships recap </title><link>/2025/recap</link>
        <description>&lt;p&gt;Results from &lt;b&gt;Nice&lt;/b&gt;&lt;/p&gt;</description>
        <pubDate>Mon, 06 Jan 2025 10:00:00 GMT</pubDate><dc:creator>Sam</dc:creator></item>
      <item><title></title><link>https://hyrox.test/untitled</link></item>
      <item><title>Guid only</title><guid>https://hyrox.test/guid</guid><pubDate>whenever</pubDate></item>
    </channel></rss>"#;

    fn adapter() -> FeedAdapter {
        FeedAdapter::articles(HttpClient::with_defaults().unwrap(), false)
    }

    fn target() -> SourceTarget {
        SourceTarget::feed("Hyrox Official", "https://hyrox.test/feed/")
    }

    #[test]
    fn normalizes_entries() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let a = adapter();
        let recs = FeedAdapter::records_from_str(FEED, 50).unwrap();
        let out: Vec<_> = recs.into_iter().filter_map(|r| a.normalize(r, &target(), now)).collect();
        assert_eq!(out.len(), 2);

        let first = &out[0];
        assert_eq!(first.title, "Hyrox World Championships recap");
        assert_eq!(first.canonical_url, "https://hyrox.test/2025/recap");
        assert_eq!(first.description, "Results from Nice");
        assert_eq!(first.published_at, Utc.with_ymd_and_hms(2025, 1, 6, 10, 0, 0).unwrap());
        assert!(!first.published_at_inferred);
        assert_eq!(first.side_channel.author.as_deref(), Some("Sam"));
        assert_eq!(first.creator.profile_url.as_deref(), Some("https://hyrox.test/"));

        let second = &out[1];
        assert_eq!(second.canonical_url, "https://hyrox.test/guid");
        assert!(second.published_at_inferred);
        assert_eq!(second.published_at, now);
    }

    #[test]
    fn priority_flag_follows_target() {
        let a = adapter();
        let now = Utc::now();
        let recs = FeedAdapter::records_from_str(FEED, 1).unwrap();
        let c = a
            .normalize(recs[0].clone(), &target().priority(), now)
            .unwrap();
        assert!(c.is_priority);
    }

    #[test]
    fn priority_feed_urls() {
        assert_eq!(priority_feed_url("https://roxlyfe.substack.com"), "https://roxlyfe.substack.com/feed");
        assert_eq!(priority_feed_url("https://coach.test/"), "https://coach.test/feed");
        assert_eq!(priority_feed_url("https://coach.test/feed/"), "https://coach.test/feed/");
        assert_eq!(priority_feed_url("https://coach.test/rss.xml"), "https://coach.test/rss.xml");
        assert_eq!(
            priority_feed_url("https://coach.test/blog/posts/archive"),
            "https://coach.test/blog/posts/archive"
        );
    }
}
