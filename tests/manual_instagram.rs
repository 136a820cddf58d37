// tests/manual_instagram.rs
//
// Hand-added Instagram posts against a mocked post page: Open Graph
// metadata, link normalization, duplicates and the login-wall fallback.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fitness_discovery::credibility::CredibilityConfig;
use fitness_discovery::curation::{add_instagram_post, ManualAddError, ManualPost};
use fitness_discovery::ingest::http::{HttpClient, RetryPolicy};
use fitness_discovery::model::{Category, ContentStatus, Platform};
use fitness_discovery::persist::PersistenceGate;
use fitness_discovery::store::{ContentStore, MemoryStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POST_PAGE: &str = r#"<!DOCTYPE html><html><head>
<meta property="og:title" content="hyrox_runner on Instagram: &quot;Sub-60 in Berlin&quot;">
<meta property="og:description" content="1,204 likes, 33 comments. Splits in the caption.">
<meta property="og:image" content="https://cdn.test/berlin.jpg">
</head><body></body></html>"#;

fn http() -> HttpClient {
    HttpClient::new(Duration::from_secs(5), RetryPolicy::none()).expect("http client")
}

fn gate(store: Arc<MemoryStore>) -> PersistenceGate {
    PersistenceGate::new(store, Arc::new(CredibilityConfig::default()))
}

fn post(url: &str) -> ManualPost {
    ManualPost {
        url: url.into(),
        ..ManualPost::default()
    }
}

#[tokio::test]
async fn reel_link_is_stored_with_page_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/C9xYz_1/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(POST_PAGE))
        .expect(1)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());

    let mut req = post("https://www.instagram.com/reel/C9xYz_1/?igsh=abc");
    req.category = Some(Category::RaceRecap);
    let item = add_instagram_post(&gate(store.clone()), &http(), &server.uri(), &req, Utc::now())
        .await
        .unwrap();

    assert_eq!(item.url, "https://www.instagram.com/p/C9xYz_1/");
    assert_eq!(item.platform, Platform::Instagram);
    assert_eq!(item.status, ContentStatus::Discovered);
    assert_eq!(item.category, Category::RaceRecap);
    assert_eq!(item.title, "hyrox_runner on Instagram: \"Sub-60 in Berlin\"");
    assert_eq!(item.thumbnail_url.as_deref(), Some("https://cdn.test/berlin.jpg"));
    assert_eq!(item.side_channel.author.as_deref(), Some("@hyrox_runner"));
    assert!(store.creators().iter().any(|c| c.name == "hyrox_runner"));

    // Same post through its /p/ link is a duplicate; no second page fetch.
    let err = add_instagram_post(
        &gate(store.clone()),
        &http(),
        &server.uri(),
        &post("https://instagram.com/p/C9xYz_1/"),
        Utc::now(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ManualAddError::AlreadyStored(_)));
    assert_eq!(store.content_count(), 1);
}

#[tokio::test]
async fn login_wall_falls_back_to_editor_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/Wall1/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());

    let mut req = post("https://www.instagram.com/p/Wall1/");
    req.description = Some("Great sled push cue".into());
    let item = add_instagram_post(&gate(store.clone()), &http(), &server.uri(), &req, Utc::now())
        .await
        .unwrap();

    assert_eq!(item.title, "Instagram Post by Unknown");
    assert_eq!(item.description, "Great sled push cue");
    assert_eq!(item.category, Category::Other);
    assert_eq!(item.side_channel.author.as_deref(), Some("@unknown"));
    assert!(store.creators().iter().any(|c| c.name == "Instagram User"));
}

#[tokio::test]
async fn non_post_links_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let err = add_instagram_post(
        &gate(store.clone()),
        &http(),
        "http://127.0.0.1:9",
        &post("https://www.instagram.com/hyrox_runner/"),
        Utc::now(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ManualAddError::InvalidUrl(_)));
    assert_eq!(store.content_count(), 0);
}
