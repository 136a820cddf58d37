// tests/providers_rss.rs
//
// Feed adapter against a local mock server: RSS and Atom, relative links,
// HTML entities, podcast attribution and the og:image enrichment hook.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use fitness_discovery::ingest::http::{HttpClient, RetryPolicy};
use fitness_discovery::ingest::providers::rss::FeedAdapter;
use fitness_discovery::ingest::types::{CandidateSource, SourceTarget};
use fitness_discovery::model::{Category, Platform};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http() -> HttpClient {
    HttpClient::new(Duration::from_secs(5), RetryPolicy::none()).expect("http client")
}

fn xml(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/rss+xml")
        .set_body_string(body)
}

#[tokio::test]
async fn rss_items_are_normalized() {
    let server = MockServer::start().await;
    let feed = r#"<rss version="2.0"><channel><title>BoxRox</title><link>https://boxrox.test/</link>
      <item>
        <title>Hyrox&nbsp;Stockholm&nbsp;&ndash; results</title>
        <link>/2025/01/stockholm</link>
        <description>&lt;p&gt;Full &lt;b&gt;results&lt;/b&gt;&lt;/p&gt;</description>
        <pubDate>Tue, 07 Jan 2025 09:30:00 GMT</pubDate>
        <dc:creator>Alex Writer</dc:creator>
      </item>
      <item><title>   </title><link>https://boxrox.test/empty</link></item>
      <item><title>Undated piece</title><link>https://boxrox.test/undated</link></item>
    </channel></rss>"#;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(xml(feed.to_string()))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = FeedAdapter::articles(http(), false);
    let target = SourceTarget::feed("BoxRox", format!("{}/feed", server.uri())).with_category(Category::Training);
    let now = Utc.with_ymd_and_hms(2025, 1, 8, 12, 0, 0).unwrap();
    let out = adapter.collect(&target, now).await.expect("collect");

    assert_eq!(out.raw, 3);
    assert_eq!(out.candidates.len(), 2, "untitled item is dropped");

    let first = &out.candidates[0];
    assert_eq!(first.platform, Platform::Article);
    assert_eq!(first.source_name, "BoxRox");
    assert_eq!(first.title, "Hyrox Stockholm \u{2013} results");
    assert_eq!(first.canonical_url, format!("{}/2025/01/stockholm", server.uri()));
    assert_eq!(first.description, "Full results");
    assert_eq!(first.published_at, Utc.with_ymd_and_hms(2025, 1, 7, 9, 30, 0).unwrap());
    assert!(!first.published_at_inferred);
    assert_eq!(first.category_hint, Some(Category::Training));
    assert_eq!(first.side_channel.author.as_deref(), Some("Alex Writer"));
    assert!(!first.is_priority);

    let undated = &out.candidates[1];
    assert_eq!(undated.published_at, now);
    assert!(undated.published_at_inferred);
}

#[tokio::test]
async fn atom_link_href_is_used() {
    let server = MockServer::start().await;
    let feed = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Hybrid Blog</title>
  <link href="https://blog.test/" rel="alternate"/>
  <entry>
    <title>Wall balls for Hyrox</title>
    <link rel="alternate" href="https://blog.test/posts/wall-balls"/>
    <id>tag:blog.test,2025:1</id>
    <updated>2025-01-07T08:00:00Z</updated>
    <summary>Short &amp; sweet</summary>
  </entry>
</feed>"#;
    Mock::given(method("GET"))
        .and(path("/atom.xml"))
        .respond_with(xml(feed.to_string()))
        .mount(&server)
        .await;

    let adapter = FeedAdapter::articles(http(), false);
    let target = SourceTarget::feed("Hybrid Blog", format!("{}/atom.xml", server.uri())).priority();
    let out = adapter.collect(&target, Utc::now()).await.expect("collect");

    assert_eq!(out.candidates.len(), 1);
    let c = &out.candidates[0];
    assert_eq!(c.canonical_url, "https://blog.test/posts/wall-balls");
    assert_eq!(c.description, "Short & sweet");
    assert_eq!(c.creator.profile_url.as_deref(), Some("https://blog.test/"));
    assert!(c.is_priority, "direct priority feed marks its items");
}

#[tokio::test]
async fn podcast_items_are_attributed_to_the_show() {
    let server = MockServer::start().await;
    let feed = r#"<rss xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"><channel>
      <title>Rox Lyfe Podcast</title>
      <itunes:image href="https://pod.test/cover.jpg"/>
      <item>
        <title>Ep 40: Sled pull technique</title>
        <link>https://pod.test/ep40</link>
        <pubDate>Mon, 06 Jan 2025 06:00:00 GMT</pubDate>
        <enclosure url="https://cdn.pod.test/ep40.mp3" type="audio/mpeg" length="1"/>
        <itunes:duration>45:30</itunes:duration>
      </item>
    </channel></rss>"#;
    Mock::given(method("GET"))
        .and(path("/pod"))
        .respond_with(xml(feed.to_string()))
        .mount(&server)
        .await;

    let adapter = FeedAdapter::podcasts(http());
    let target = SourceTarget::feed("roxlyfe", format!("{}/pod", server.uri()));
    let out = adapter.collect(&target, Utc::now()).await.expect("collect");

    let c = &out.candidates[0];
    assert_eq!(c.platform, Platform::Podcast);
    assert_eq!(c.source_name, "Rox Lyfe Podcast");
    assert_eq!(c.duration_seconds, Some(45 * 60 + 30));
    assert_eq!(c.thumbnail_url.as_deref(), Some("https://pod.test/cover.jpg"));
    assert_eq!(c.side_channel.external_url.as_deref(), Some("https://cdn.pod.test/ep40.mp3"));
}

#[tokio::test]
async fn prepare_fills_missing_thumbnail_from_page_meta() {
    let server = MockServer::start().await;
    let page = r#"<html><head><meta property="og:image" content="/img/cover.jpg"></head></html>"#;
    Mock::given(method("GET"))
        .and(path("/post"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .expect(1)
        .mount(&server)
        .await;

    let feed = format!(
        r#"<rss><channel><title>BarBend</title><item><title>Hyrox gear guide</title><link>{}/post</link></item></channel></rss>"#,
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(xml(feed))
        .mount(&server)
        .await;

    let adapter = FeedAdapter::articles(http(), true);
    let target = SourceTarget::feed("BarBend", format!("{}/feed", server.uri()));
    let mut out = adapter.collect(&target, Utc::now()).await.expect("collect");
    let c = &mut out.candidates[0];
    assert!(c.thumbnail_url.is_none());

    adapter.prepare(c).await;
    assert_eq!(c.thumbnail_url.as_deref(), Some(format!("{}/img/cover.jpg", server.uri()).as_str()));
}

#[tokio::test]
async fn non_feed_body_is_a_source_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>moved</body></html>"))
        .mount(&server)
        .await;

    let adapter = FeedAdapter::articles(http(), false);
    let target = SourceTarget::feed("Broken", format!("{}/feed", server.uri()));
    assert!(adapter.collect(&target, Utc::now()).await.is_err());
}
