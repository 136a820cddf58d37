// src/ingest/providers/reddit.rs
//! Reddit public JSON listings: subreddit `new` feeds and scoped search.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::config::RedditConfig;
use crate::ingest::dates::from_unix;
use crate::ingest::http::{FetchError, HttpClient};
use crate::ingest::types::{SourceAdapter, SourceTarget, TargetKind};
use crate::ingest::{clean_description, clean_text};
use crate::model::{ContentCandidate, CreatorHint, Engagement, Platform, SideChannel};

const PLACEHOLDER_THUMBS: [&str; 5] = ["self", "default", "nsfw", "spoiler", "image"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    pub permalink: String,
    pub url: Option<String>,
    pub selftext: String,
    pub author: Option<String>,
    pub subreddit: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: Option<f64>,
    pub thumbnail: Option<String>,
    pub stickied: bool,
    pub is_self: bool,
}

/// Posts from a `Listing`; stickied and malformed children are dropped.
pub fn parse_listing(body: &Value) -> Vec<RedditPost> {
    body.pointer("/data/children")
        .and_then(Value::as_array)
        .map(|children| {
            children
                .iter()
                .filter_map(|ch| serde_json::from_value::<RedditPost>(ch.get("data")?.clone()).ok())
                .filter(|p| !p.stickied)
                .collect()
        })
        .unwrap_or_default()
}

pub struct RedditAdapter {
    http: HttpClient,
    cfg: RedditConfig,
}

impl RedditAdapter {
    pub fn new(http: HttpClient, cfg: RedditConfig) -> Self {
        Self { http, cfg }
    }

    fn request(&self, target: &SourceTarget) -> (String, Vec<(&'static str, String)>) {
        let base = self.cfg.api_base.trim_end_matches('/');
        let limit = target.limit.clamp(1, 100).to_string();
        match target.kind {
            TargetKind::Query => {
                let scope = target.scope.as_deref().filter(|s| !s.eq_ignore_ascii_case("all"));
                let url = match scope {
                    Some(sub) => format!("{base}/r/{sub}/search.json"),
                    None => format!("{base}/search.json"),
                };
                let mut q = vec![
                    ("q", target.locator.clone()),
                    ("sort", "new".to_string()),
                    ("t", "month".to_string()),
                    ("limit", limit),
                ];
                if scope.is_some() {
                    q.push(("restrict_sr", "1".to_string()));
                }
                (url, q)
            }
            _ => {
                let sub = target.locator.trim_start_matches("r/");
                (format!("{base}/r/{sub}/new.json"), vec![("limit", limit)])
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    type Raw = RedditPost;

    fn name(&self) -> &'static str {
        "reddit"
    }

    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    async fn fetch(&self, target: &SourceTarget) -> Result<Vec<RedditPost>, FetchError> {
        let (url, query) = self.request(target);
        let body = self.http.get_json(&url, &query, &[]).await?;
        Ok(parse_listing(&body))
    }

    fn normalize(&self, post: RedditPost, target: &SourceTarget, now: DateTime<Utc>) -> Option<ContentCandidate> {
        let title = clean_text(&post.title);
        let permalink = post.permalink.trim();
        if title.is_empty() || !permalink.starts_with('/') {
            return None;
        }
        let url = format!("https://www.reddit.com{permalink}");
        let (published_at, inferred) = match post.created_utc.and_then(from_unix) {
            Some(ts) => (ts, false),
            None => {
                tracing::warn!(%url, "reddit post without created_utc, using now");
                (now, true)
            }
        };
        let sub = if post.subreddit.is_empty() {
            target.locator.trim_start_matches("r/").to_string()
        } else {
            post.subreddit.clone()
        };
        let source_name = format!("r/{sub}");

        let mut c = ContentCandidate::new(Platform::Reddit, source_name.clone(), title, url.clone(), published_at);
        c.published_at_inferred = inferred;
        c.description = clean_description(&post.selftext);
        c.thumbnail_url = post
            .thumbnail
            .as_deref()
            .map(str::trim)
            .filter(|t| t.starts_with("http") && !PLACEHOLDER_THUMBS.contains(t))
            .map(|t| html_escape::decode_html_entities(t).to_string());
        c.engagement = Engagement {
            views: post.score.max(0),
            likes: post.score.max(0),
            comments: post.num_comments.max(0),
        };
        c.is_priority = target.marks_priority();
        c.category_hint = target.category.or(self.cfg.category);
        c.creator = CreatorHint {
            name: source_name,
            platform_id: Some(sub.to_ascii_lowercase()),
            profile_url: Some(format!("https://www.reddit.com/r/{sub}")),
            ..CreatorHint::default()
        };
        let external = post
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !post.is_self && u.starts_with("http") && !u.contains("reddit.com") && !u.contains("redd.it"))
            .map(String::from);
        c.side_channel = SideChannel {
            author: post
                .author
                .as_deref()
                .filter(|a| !a.is_empty() && *a != "[deleted]")
                .map(|a| format!("u/{a}")),
            external_url: external,
            ..SideChannel::default()
        };
        Some(c)
    }
}
