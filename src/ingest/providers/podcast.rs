// src/ingest/providers/podcast.rs
//! iTunes Search API, podcast episodes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::config::PodcastConfig;
use crate::ingest::dates::published_or_now;
use crate::ingest::http::{FetchError, HttpClient};
use crate::ingest::types::{SourceAdapter, SourceTarget};
use crate::ingest::{clean_description, clean_text};
use crate::model::{ContentCandidate, CreatorHint, Platform, SideChannel};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItunesEpisode {
    pub track_id: Option<i64>,
    pub track_name: String,
    pub collection_id: Option<i64>,
    pub collection_name: String,
    pub collection_view_url: Option<String>,
    pub track_view_url: Option<String>,
    pub episode_url: Option<String>,
    pub release_date: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub artwork_url600: Option<String>,
    pub artwork_url160: Option<String>,
    pub artwork_url60: Option<String>,
    pub track_time_millis: Option<i64>,
}

impl ItunesEpisode {
    fn artwork(&self) -> Option<String> {
        self.artwork_url600
            .as_ref()
            .or(self.artwork_url160.as_ref())
            .or(self.artwork_url60.as_ref())
            .cloned()
            .filter(|u| !u.trim().is_empty())
    }
}

/// Spotify has no public lookup by iTunes id; link to its episode search.
pub fn spotify_search_url(show: &str, episode: &str) -> String {
    let q = format!("{show} {episode}");
    format!(
        "https://open.spotify.com/search/{}/episodes",
        urlencoding::encode(q.trim())
    )
}

pub fn parse_episodes(body: &Value) -> Vec<ItunesEpisode> {
    body.get("results")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| serde_json::from_value::<ItunesEpisode>(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

pub struct ItunesAdapter {
    http: HttpClient,
    cfg: PodcastConfig,
}

impl ItunesAdapter {
    pub fn new(http: HttpClient, cfg: PodcastConfig) -> Self {
        Self { http, cfg }
    }
}

#[async_trait]
impl SourceAdapter for ItunesAdapter {
    type Raw = ItunesEpisode;

    fn name(&self) -> &'static str {
        "itunes"
    }

    fn platform(&self) -> Platform {
        Platform::Podcast
    }

    async fn fetch(&self, target: &SourceTarget) -> Result<Vec<ItunesEpisode>, FetchError> {
        let mut query = vec![
            ("term", target.locator.clone()),
            ("media", "podcast".to_string()),
            ("entity", "podcastEpisode".to_string()),
            ("limit", target.limit.clamp(1, 200).to_string()),
        ];
        if let Some(country) = &self.cfg.country {
            query.push(("country", country.clone()));
        }
        let url = format!("{}/search", self.cfg.api_base.trim_end_matches('/'));
        let body = self.http.get_json(&url, &query, &[]).await?;
        Ok(parse_episodes(&body))
    }

    fn normalize(&self, ep: ItunesEpisode, target: &SourceTarget, now: DateTime<Utc>) -> Option<ContentCandidate> {
        let title = clean_text(&ep.track_name);
        if title.is_empty() {
            return None;
        }
        let url = ep
            .track_view_url
            .clone()
            .or_else(|| ep.episode_url.clone())
            .filter(|u| u.starts_with("http"))?;
        let show = clean_text(&ep.collection_name);
        let source_name = if show.is_empty() { target.name.clone() } else { show };
        let (published_at, inferred) = published_or_now(ep.release_date.as_deref(), now);

        let mut c = ContentCandidate::new(Platform::Podcast, source_name.clone(), title.clone(), url, published_at);
        c.published_at_inferred = inferred;
        c.description = ep
            .description
            .as_deref()
            .or(ep.short_description.as_deref())
            .map(clean_description)
            .unwrap_or_default();
        c.thumbnail_url = ep.artwork();
        c.duration_seconds = ep.track_time_millis.filter(|ms| *ms > 0).map(|ms| ms / 1_000);
        c.is_priority = target.marks_priority();
        c.category_hint = target.category.or(self.cfg.category);
        c.creator = CreatorHint {
            name: source_name.clone(),
            platform_id: ep.collection_id.map(|id| id.to_string()),
            profile_url: ep.collection_view_url.clone(),
            avatar_url: ep.artwork(),
            follower_count: None,
        };
        c.side_channel = SideChannel {
            apple_url: ep.track_view_url.clone(),
            spotify_url: Some(spotify_search_url(&source_name, &title)),
            external_url: ep.episode_url.clone(),
            ..SideChannel::default()
        };
        Some(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spotify_link_is_encoded() {
        assert_eq!(
            spotify_search_url("Rox Lyfe", "Ep 1: Sleds"),
            "https://open.spotify.com/search/Rox%20Lyfe%20Ep%201%3A%20Sleds/episodes"
        );
    }

    #[test]
    fn parses_and_normalizes_episode() {
        let body = json!({"resultCount": 2, "results": [
            {"trackName": "Hyrox Sled Push Tips", "collectionName": "Rox Lyfe Podcast",
             "collectionId": 42, "trackViewUrl": "https://podcasts.apple.com/ep/1",
             "episodeUrl": "https://cdn.test/1.mp3", "releaseDate": "2025-01-06T08:00:00Z",
             "description": "<p>Sled work</p>", "trackTimeMillis": 1800000,
             "artworkUrl600": "https://img.test/600.jpg"},
            {"trackName": 7}
        ]});
        let eps = parse_episodes(&body);
        assert_eq!(eps.len(), 1);

        let a = ItunesAdapter::new(HttpClient::with_defaults().unwrap(), PodcastConfig::default());
        let c = a
            .normalize(eps[0].clone(), &SourceTarget::query("hyrox"), Utc::now())
            .unwrap();
        assert_eq!(c.canonical_url, "https://podcasts.apple.com/ep/1");
        assert_eq!(c.source_name, "Rox Lyfe Podcast");
        assert_eq!(c.description, "Sled work");
        assert_eq!(c.duration_seconds, Some(1800));
        assert_eq!(c.creator.platform_id.as_deref(), Some("42"));
        assert_eq!(c.side_channel.apple_url.as_deref(), Some("https://podcasts.apple.com/ep/1"));
        assert!(c.side_channel.spotify_url.unwrap().starts_with("https://open.spotify.com/search/"));
    }

    #[test]
    fn episode_without_links_is_dropped() {
        let a = ItunesAdapter::new(HttpClient::with_defaults().unwrap(), PodcastConfig::default());
        let ep = ItunesEpisode {
            track_name: "Hyrox".into(),
            ..ItunesEpisode::default()
        };
        assert!(a.normalize(ep, &SourceTarget::query("hyrox"), Utc::now()).is_none());
    }
}
