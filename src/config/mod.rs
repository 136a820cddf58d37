// src/config/mod.rs
//! Discovery configuration: sources per platform, limits, pacing and credibility.
//!
//! Loaded from `DISCOVERY_CONFIG_PATH` or `config/discovery.toml`; built-in
//! defaults apply when neither exists. Secrets and a few knobs come from env.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::credibility::CredibilityConfig;
use crate::model::Category;

pub const DEFAULT_DISCOVERY_CONFIG_PATH: &str = "config/discovery.toml";
pub const ENV_DISCOVERY_CONFIG_PATH: &str = "DISCOVERY_CONFIG_PATH";

pub const ENV_YOUTUBE_API_KEY: &str = "YOUTUBE_API_KEY";
pub const ENV_RAPIDAPI_KEY: &str = "RAPIDAPI_KEY";
pub const ENV_YOUTUBE_REGION: &str = "YOUTUBE_REGION";
pub const ENV_YOUTUBE_MIN_DURATION: &str = "YOUTUBE_MIN_DURATION";
pub const ENV_PODCAST_COUNTRY: &str = "PODCAST_COUNTRY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Pause between consecutive source requests.
    pub request_delay_ms: u64,
    /// Wall-clock budget for one platform run.
    pub timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 500,
            timeout_secs: 120,
            http_timeout_secs: 15,
            max_retries: 3,
            retry_base_ms: 2_000,
        }
    }
}

impl RunConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArticleConfig {
    pub feeds: Vec<FeedConfig>,
    pub items_per_feed: usize,
    /// Scrape `og:image` when a new article has no feed thumbnail.
    pub fetch_thumbnails: bool,
}

impl Default for ArticleConfig {
    fn default() -> Self {
        let feed = |name: &str, url: &str, category| FeedConfig {
            name: name.into(),
            url: url.into(),
            category: Some(category),
        };
        Self {
            feeds: vec![
                feed("Hyrox Official", "https://hyrox.com/feed/", Category::RaceRecap),
                feed("Morning Chalk Up", "https://morningchalkup.com/feed/", Category::Training),
                feed("BoxRox", "https://www.boxrox.com/feed/", Category::Training),
                feed("BarBend", "https://barbend.com/feed/", Category::Training),
                feed("Coach Mag", "https://www.coachmag.co.uk/feed", Category::Training),
            ],
            items_per_feed: 50,
            fetch_thumbnails: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PodcastConfig {
    pub api_base: String,
    pub search_terms: Vec<String>,
    pub limit: usize,
    pub country: Option<String>,
    pub feeds: Vec<FeedConfig>,
    pub category: Option<Category>,
}

impl Default for PodcastConfig {
    fn default() -> Self {
        Self {
            api_base: "https://itunes.apple.com".into(),
            search_terms: [
                "hyrox",
                "hyrox training",
                "hyrox race",
                "hybrid fitness racing",
                "hyrox workout",
                "Hybrid Coaching Podcast",
                "Rox Lyfe Podcast",
                "HYROX HEROES",
                "TrainHybrd Podcast",
                "UKHXR",
                "fitness racing podcast",
                "hyrox review",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            limit: 30,
            country: None,
            feeds: Vec::new(),
            category: Some(Category::Training),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    pub api_base: String,
    pub queries: Vec<String>,
    pub max_results: usize,
    pub region: Option<String>,
    pub min_duration_secs: i64,
    /// Accepted `defaultAudioLanguage`/`defaultLanguage` values; empty string means unset.
    pub languages: Vec<String>,
    pub category: Option<Category>,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/youtube/v3".into(),
            queries: vec!["Hyrox".into()],
            max_results: 50,
            region: None,
            min_duration_secs: 60,
            languages: ["", "en", "en-us", "en-gb", "en-au", "en-ca"]
                .into_iter()
                .map(String::from)
                .collect(),
            category: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubredditConfig {
    pub name: String,
    #[serde(default = "default_subreddit_limit")]
    pub limit: usize,
}

fn default_subreddit_limit() -> usize {
    50
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub api_base: String,
    pub subreddits: Vec<SubredditConfig>,
    pub search_query: Option<String>,
    pub search_subreddits: Vec<String>,
    pub search_limit: usize,
    pub category: Option<Category>,
}

impl Default for RedditConfig {
    fn default() -> Self {
        let sub = |name: &str, limit| SubredditConfig {
            name: name.into(),
            limit,
        };
        Self {
            api_base: "https://www.reddit.com".into(),
            subreddits: vec![
                sub("hyrox", 30),
                sub("fitness", 50),
                sub("crossfit", 50),
                sub("running", 50),
            ],
            search_query: Some("hyrox".into()),
            search_subreddits: ["hyrox", "fitness", "crossfit", "running", "all"]
                .into_iter()
                .map(String::from)
                .collect(),
            search_limit: 25,
            category: Some(Category::Community),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InstagramConfig {
    pub api_base: String,
    /// Public site, fetched for Open Graph data when a post is added by hand.
    pub web_base: String,
    pub api_host: String,
    pub hashtags: Vec<String>,
    pub min_likes: i64,
    pub min_comments: i64,
    pub request_delay_ms: u64,
    pub category: Option<Category>,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            api_base: "https://instagram-scraper.p.rapidapi.com".into(),
            web_base: "https://www.instagram.com".into(),
            api_host: "instagram-scraper.p.rapidapi.com".into(),
            hashtags: [
                "hyrox",
                "hyroxtraining",
                "hyroxworkout",
                "hyroxathlete",
                "hyroxrace",
                "hyroxworld",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            min_likes: 50,
            min_comments: 5,
            request_delay_ms: 3_000,
            category: Some(Category::Community),
        }
    }
}

/// Searches run for one athlete or performance topic.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    /// Trailing window used when an entity run names no days.
    pub lookback_days: i64,
    /// Appended to athlete terms and prefixed to default topic terms so
    /// searches stay on the newsletter's sport.
    pub scope_word: String,
    pub max_results: usize,
    /// Terms used for YouTube; the other platforms use `search_terms`.
    pub youtube_terms: usize,
    pub search_terms: usize,
    pub news_search_url: String,
    pub fetch_thumbnails: bool,
    pub reddit_subreddits: Vec<String>,
    pub reddit_limit: usize,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            lookback_days: 90,
            scope_word: "hyrox".into(),
            max_results: 20,
            youtube_terms: 3,
            search_terms: 2,
            news_search_url: "https://news.google.com/rss/search".into(),
            fetch_thumbnails: true,
            reddit_subreddits: ["hyrox", "fitness", "crossfit"].into_iter().map(String::from).collect(),
            reddit_limit: 30,
        }
    }
}

/// API keys read from the environment.
#[derive(Clone, Default)]
pub struct Credentials {
    pub youtube_api_key: Option<String>,
    pub rapidapi_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("youtube_api_key", &self.youtube_api_key.as_ref().map(|_| "***"))
            .field("rapidapi_key", &self.rapidapi_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            youtube_api_key: non_empty_env(ENV_YOUTUBE_API_KEY),
            rapidapi_key: non_empty_env(ENV_RAPIDAPI_KEY),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub run: RunConfig,
    pub credibility: CredibilityConfig,
    pub article: ArticleConfig,
    pub podcast: PodcastConfig,
    pub youtube: YoutubeConfig,
    pub reddit: RedditConfig,
    pub instagram: InstagramConfig,
    pub entity: EntityConfig,
}

impl DiscoveryConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing discovery config")
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading discovery config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// `$DISCOVERY_CONFIG_PATH`, then `config/discovery.toml`, then built-in
    /// defaults; env overrides applied last.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_DISCOVERY_CONFIG_PATH) {
            Ok(p) => Self::load_from(&PathBuf::from(p))?,
            Err(_) => {
                let p = PathBuf::from(DEFAULT_DISCOVERY_CONFIG_PATH);
                if p.exists() {
                    Self::load_from(&p)?
                } else {
                    tracing::info!("no discovery config file, using built-in defaults");
                    Self::default()
                }
            }
        };
        cfg.apply_env();
        Ok(cfg)
    }

    /// `PODCAST_COUNTRY`, `YOUTUBE_REGION`, `YOUTUBE_MIN_DURATION`.
    pub fn apply_env(&mut self) {
        if let Some(c) = non_empty_env(ENV_PODCAST_COUNTRY) {
            self.podcast.country = Some(c);
        }
        if let Some(r) = non_empty_env(ENV_YOUTUBE_REGION) {
            self.youtube.region = Some(r);
        }
        if let Some(d) = non_empty_env(ENV_YOUTUBE_MIN_DURATION) {
            match d.parse::<i64>() {
                Ok(secs) => self.youtube.min_duration_secs = secs.max(0),
                Err(_) => tracing::warn!(value = %d, "ignoring invalid {ENV_YOUTUBE_MIN_DURATION}"),
            }
        }
    }
}
