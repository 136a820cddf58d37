// tests/config_files.rs
//
// The shipped config/ files parse and wire into the runtime the way the
// service and CLI use them.

use std::path::Path;

use chrono::Utc;
use serial_test::serial;

use fitness_discovery::bootstrap::{Runtime, StoreKind};
use fitness_discovery::config::DiscoveryConfig;
use fitness_discovery::ingest::config::load_priority_sources_from;
use fitness_discovery::ingest::types::TargetKind;
use fitness_discovery::model::{Category, Platform};
use fitness_discovery::store::{ContentStore, MemoryStore};
use fitness_discovery::{DiscoveryWindow, SourceCatalog};

#[test]
fn discovery_toml_matches_built_in_defaults() {
    let file = DiscoveryConfig::load_from(Path::new("config/discovery.toml")).expect("discovery.toml");
    let defaults = DiscoveryConfig::default();
    assert_eq!(file.article.feeds.len(), defaults.article.feeds.len());
    assert_eq!(file.article.feeds[0].category, Some(Category::RaceRecap));
    assert_eq!(file.podcast.search_terms, defaults.podcast.search_terms);
    assert_eq!(file.reddit.subreddits.len(), 4);
    assert_eq!(file.instagram.request_delay_ms, 3_000);
    assert_eq!(file.run.timeout_secs, 120);
    assert!(file.credibility.follower_bands.len() >= 2);
}

#[tokio::test]
async fn priority_seed_file_feeds_the_catalog() {
    let sources = load_priority_sources_from(Path::new("config/priority_sources.toml")).expect("priority seed");
    assert!(sources.iter().any(|s| s.platform == Platform::Youtube && s.external_id.is_some()));

    let store = MemoryStore::new();
    for s in &sources {
        store.upsert_priority_source(s).await.unwrap();
    }
    let article = store.active_priority_sources(Platform::Article).await.unwrap();
    assert_eq!(article.len(), 1);

    let cfg = DiscoveryConfig::load_from(Path::new("config/discovery.toml")).unwrap();
    let catalog = fitness_discovery::ConfiguredCatalog::new(cfg, Default::default()).unwrap();
    let job = catalog
        .job(Platform::Article, &article, &DiscoveryWindow::default_at(Utc::now()))
        .unwrap();
    let priority: Vec<_> = job.sources.iter().filter(|s| s.target.is_priority).collect();
    assert_eq!(priority.len(), 1);
    assert_eq!(priority[0].target.kind, TargetKind::Feed);
    assert_eq!(priority[0].target.locator, "https://roxlyfe.substack.com/feed");
}

#[tokio::test]
#[serial]
async fn runtime_boots_in_memory_and_seeds_priority_sources() {
    std::env::remove_var("DATABASE_URL");
    std::env::remove_var("PRIORITY_SOURCES_PATH");
    std::env::remove_var("DISCOVERY_CONFIG_PATH");
    std::env::set_var("DISCOVERY_STORE", "memory");

    let rt = Runtime::from_env().await.expect("runtime");
    std::env::remove_var("DISCOVERY_STORE");
    assert_eq!(rt.relevance.snapshot().topic(), "hyrox");
    // Seeded at boot, before any explicit seed call.
    let reddit = rt.store.active_priority_sources(Platform::Reddit).await.unwrap();
    assert_eq!(reddit[0].source_name, "hyrox");
    assert_eq!(rt.seed_priority_sources().await.expect("seed"), 4);
}

#[tokio::test]
#[serial]
async fn postgres_store_without_database_url_is_an_error() {
    std::env::remove_var("DATABASE_URL");
    std::env::remove_var("DISCOVERY_STORE");

    let err = Runtime::from_env().await.err().expect("missing DATABASE_URL must fail");
    assert!(format!("{err:#}").contains("DATABASE_URL"));
    assert!(Runtime::with_store(StoreKind::Memory).await.is_ok());
}
