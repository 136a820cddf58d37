// src/ingest/providers/youtube.rs
//! YouTube Data API v3: search, then video details and channel statistics.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::config::YoutubeConfig;
use crate::ingest::dates::published_or_now;
use crate::ingest::http::{FetchError, HttpClient};
use crate::ingest::providers::json_i64;
use crate::ingest::types::{SourceAdapter, SourceTarget, TargetKind};
use crate::ingest::{clean_description, clean_text};
use crate::model::{ContentCandidate, CreatorHint, Engagement, Platform};
use crate::window::DiscoveryWindow;

const BATCH: usize = 50;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Thumb {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    pub description: String,
    pub published_at: Option<String>,
    pub channel_id: String,
    pub channel_title: String,
    pub thumbnails: HashMap<String, Thumb>,
    pub default_audio_language: Option<String>,
    pub default_language: Option<String>,
}

impl VideoSnippet {
    fn best_thumbnail(&self) -> Option<String> {
        ["maxres", "high", "medium", "default"]
            .iter()
            .find_map(|k| self.thumbnails.get(*k))
            .map(|t| t.url.clone())
            .filter(|u| !u.is_empty())
    }

    fn language(&self) -> String {
        self.default_audio_language
            .as_deref()
            .or(self.default_language.as_deref())
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }
}

/// Details from `videos.list`; absent when that call failed.
#[derive(Debug, Clone, Default)]
pub struct VideoDetails {
    pub engagement: Engagement,
    pub duration_seconds: Option<i64>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ChannelInfo {
    pub subscribers: Option<i64>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VideoRecord {
    pub video_id: String,
    pub snippet: VideoSnippet,
    pub details: Option<VideoDetails>,
    pub channel: Option<ChannelInfo>,
}

pub struct YoutubeAdapter {
    http: HttpClient,
    cfg: YoutubeConfig,
    api_key: String,
    window: Option<DiscoveryWindow>,
}

impl YoutubeAdapter {
    pub fn new(http: HttpClient, cfg: YoutubeConfig, api_key: String, window: Option<DiscoveryWindow>) -> Self {
        Self {
            http,
            cfg,
            api_key,
            window,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.cfg.api_base.trim_end_matches('/'), path)
    }

    fn search_params(&self, target: &SourceTarget) -> Vec<(&'static str, String)> {
        let mut q: Vec<(&'static str, String)> = vec![
            ("key", self.api_key.clone()),
            ("part", "snippet".into()),
            ("type", "video".into()),
            ("order", "viewCount".into()),
            ("relevanceLanguage", "en".into()),
            ("maxResults", target.limit.clamp(1, BATCH).to_string()),
        ];
        match target.kind {
            TargetKind::Channel => q.push(("channelId", target.locator.clone())),
            _ => q.push(("q", target.locator.clone())),
        }
        if let Some(region) = &self.cfg.region {
            q.push(("regionCode", region.clone()));
        }
        if let Some(w) = &self.window {
            q.push(("publishedAfter", w.start.to_rfc3339_opts(SecondsFormat::Secs, true)));
            q.push(("publishedBefore", w.end.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        q
    }

    async fn video_details(&self, ids: &[String]) -> Result<HashMap<String, VideoDetails>, FetchError> {
        let mut out = HashMap::new();
        for chunk in ids.chunks(BATCH) {
            let body = self
                .http
                .get_json(
                    &self.endpoint("videos"),
                    &[
                        ("key", self.api_key.clone()),
                        ("part", "statistics,contentDetails,snippet".into()),
                        ("id", chunk.join(",")),
                    ],
                    &[],
                )
                .await?;
            out.extend(parse_video_details(&body));
        }
        Ok(out)
    }

    async fn channel_info(&self, ids: &[String]) -> Result<HashMap<String, ChannelInfo>, FetchError> {
        let mut out = HashMap::new();
        for chunk in ids.chunks(BATCH) {
            let body = self
                .http
                .get_json(
                    &self.endpoint("channels"),
                    &[
                        ("key", self.api_key.clone()),
                        ("part", "statistics,snippet".into()),
                        ("id", chunk.join(",")),
                    ],
                    &[],
                )
                .await?;
            out.extend(parse_channel_info(&body));
        }
        Ok(out)
    }

    /// Language and minimum-duration filter; records without details pass.
    fn keep(&self, rec: &VideoRecord) -> bool {
        let Some(d) = &rec.details else {
            return true;
        };
        if let Some(secs) = d.duration_seconds {
            if secs < self.cfg.min_duration_secs {
                return false;
            }
        }
        let lang = d.language.clone().unwrap_or_else(|| rec.snippet.language());
        self.cfg.languages.is_empty() || self.cfg.languages.iter().any(|l| l.eq_ignore_ascii_case(&lang))
    }
}

/// Search hits as (videoId, snippet); malformed items are skipped.
pub fn parse_search_hits(body: &Value) -> Vec<(String, VideoSnippet)> {
    let Some(items) = body.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|it| {
            let id = it.pointer("/id/videoId").and_then(Value::as_str)?.to_string();
            let snippet: VideoSnippet = serde_json::from_value(it.get("snippet")?.clone()).ok()?;
            Some((id, snippet))
        })
        .collect()
}

pub fn parse_video_details(body: &Value) -> HashMap<String, VideoDetails> {
    let mut out = HashMap::new();
    for it in body.get("items").and_then(Value::as_array).into_iter().flatten() {
        let Some(id) = it.get("id").and_then(Value::as_str) else {
            continue;
        };
        let stats = it.get("statistics");
        let engagement = Engagement {
            views: json_i64(stats.and_then(|s| s.get("viewCount"))).unwrap_or(0),
            likes: json_i64(stats.and_then(|s| s.get("likeCount"))).unwrap_or(0),
            comments: json_i64(stats.and_then(|s| s.get("commentCount"))).unwrap_or(0),
        };
        let duration_seconds = it
            .pointer("/contentDetails/duration")
            .and_then(Value::as_str)
            .and_then(parse_iso_duration);
        let language = it
            .get("snippet")
            .and_then(|s| serde_json::from_value::<VideoSnippet>(s.clone()).ok())
            .map(|s| s.language());
        out.insert(
            id.to_string(),
            VideoDetails {
                engagement,
                duration_seconds,
                language,
            },
        );
    }
    out
}

pub fn parse_channel_info(body: &Value) -> HashMap<String, ChannelInfo> {
    let mut out = HashMap::new();
    for it in body.get("items").and_then(Value::as_array).into_iter().flatten() {
        let Some(id) = it.get("id").and_then(Value::as_str) else {
            continue;
        };
        let hidden = it
            .pointer("/statistics/hiddenSubscriberCount")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let subscribers = if hidden {
            None
        } else {
            json_i64(it.pointer("/statistics/subscriberCount"))
        };
        let avatar_url = ["high", "medium", "default"].iter().find_map(|k| {
            it.pointer(&format!("/snippet/thumbnails/{k}/url"))
                .and_then(Value::as_str)
                .map(String::from)
        });
        out.insert(id.to_string(), ChannelInfo { subscribers, avatar_url });
    }
    out
}

fn iso_duration_regex() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").unwrap())
}

/// ISO-8601 durations as YouTube reports them (`PT1H2M3S`, `P1DT2H`).
pub fn parse_iso_duration(s: &str) -> Option<i64> {
    let caps = iso_duration_regex().captures(s.trim())?;
    let n = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i64>().ok()).unwrap_or(0);
    Some(n(1) * 86_400 + n(2) * 3_600 + n(3) * 60 + n(4))
}

#[async_trait]
impl SourceAdapter for YoutubeAdapter {
    type Raw = VideoRecord;

    fn name(&self) -> &'static str {
        "youtube"
    }

    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn fetch(&self, target: &SourceTarget) -> Result<Vec<VideoRecord>, FetchError> {
        let body = self
            .http
            .get_json(&self.endpoint("search"), &self.search_params(target), &[])
            .await?;
        let hits = parse_search_hits(&body);
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = hits.iter().map(|(id, _)| id.clone()).collect();
        let mut details = match self.video_details(&ids).await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(target = %target.name, error = %e, "video statistics unavailable, keeping search hits");
                HashMap::new()
            }
        };

        let mut channel_ids: Vec<String> = hits.iter().map(|(_, s)| s.channel_id.clone()).filter(|c| !c.is_empty()).collect();
        channel_ids.sort();
        channel_ids.dedup();
        let channels = match self.channel_info(&channel_ids).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(target = %target.name, error = %e, "channel statistics unavailable");
                HashMap::new()
            }
        };

        let records: Vec<VideoRecord> = hits
            .into_iter()
            .map(|(video_id, snippet)| VideoRecord {
                details: details.remove(&video_id),
                channel: channels.get(&snippet.channel_id).cloned(),
                video_id,
                snippet,
            })
            .collect();
        let before = records.len();
        let kept: Vec<VideoRecord> = records.into_iter().filter(|r| self.keep(r)).collect();
        if kept.len() < before {
            tracing::debug!(target = %target.name, dropped = before - kept.len(), "videos filtered by language/duration");
        }
        Ok(kept)
    }

    fn normalize(&self, rec: VideoRecord, target: &SourceTarget, now: DateTime<Utc>) -> Option<ContentCandidate> {
        let title = clean_text(&rec.snippet.title);
        if title.is_empty() || rec.video_id.trim().is_empty() {
            return None;
        }
        let url = format!("https://www.youtube.com/watch?v={}", rec.video_id.trim());
        let (published_at, inferred) = published_or_now(rec.snippet.published_at.as_deref(), now);

        let channel_title = clean_text(&rec.snippet.channel_title);
        let source_name = if channel_title.is_empty() {
            target.name.clone()
        } else {
            channel_title
        };

        let mut c = ContentCandidate::new(Platform::Youtube, source_name.clone(), title, url, published_at);
        c.published_at_inferred = inferred;
        c.description = clean_description(&rec.snippet.description);
        c.thumbnail_url = rec.snippet.best_thumbnail();
        if let Some(d) = &rec.details {
            c.engagement = d.engagement;
            c.duration_seconds = d.duration_seconds;
        }
        c.is_priority = target.marks_priority();
        c.category_hint = target.category.or(self.cfg.category);

        let channel_id = Some(rec.snippet.channel_id.clone()).filter(|s| !s.is_empty());
        c.creator = CreatorHint {
            name: source_name,
            profile_url: channel_id.as_ref().map(|id| format!("https://www.youtube.com/channel/{id}")),
            platform_id: channel_id,
            avatar_url: rec.channel.as_ref().and_then(|ch| ch.avatar_url.clone()),
            follower_count: rec.channel.as_ref().and_then(|ch| ch.subscribers),
        };
        Some(c)
    }
}
