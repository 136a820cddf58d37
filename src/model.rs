// src/model.rs
//! Domain records shared by the discovery pipeline, the store and the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::window::DiscoveryWindow;

/// Content platforms the pipeline knows how to discover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Podcast,
    Article,
    Reddit,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Youtube,
        Platform::Podcast,
        Platform::Article,
        Platform::Reddit,
        Platform::Instagram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Podcast => "podcast",
            Platform::Article => "article",
            Platform::Reddit => "reddit",
            Platform::Instagram => "instagram",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown platform `{0}`")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "youtube" | "video" => Ok(Platform::Youtube),
            "podcast" | "podcasts" => Ok(Platform::Podcast),
            "article" | "articles" | "news" => Ok(Platform::Article),
            "reddit" => Ok(Platform::Reddit),
            "instagram" => Ok(Platform::Instagram),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

/// Editorial category attached to an item at insert time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    RaceRecap,
    Training,
    Nutrition,
    Gear,
    AthleteNews,
    Community,
    #[default]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::RaceRecap => "race_recap",
            Category::Training => "training",
            Category::Nutrition => "nutrition",
            Category::Gear => "gear",
            Category::AthleteNews => "athlete_news",
            Category::Community => "community",
            Category::Other => "other",
        }
    }

    /// Lenient parse used for database rows; unknown values map to `Other`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "race_recap" => Category::RaceRecap,
            "training" => Category::Training,
            "nutrition" => Category::Nutrition,
            "gear" => Category::Gear,
            "athlete_news" => Category::AthleteNews,
            "community" => Category::Community,
            _ => Category::Other,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown category `{0}`")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let c = Category::parse_lenient(&key);
        if c.as_str() == key {
            Ok(c)
        } else {
            Err(UnknownCategory(key))
        }
    }
}

/// Lifecycle status of a stored content item.
///
/// ```text
/// discovered -> selected -> published (terminal)
/// discovered <-> rejected
/// selected   <-> rejected
/// selected   -> discovered
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Discovered,
    Selected,
    Rejected,
    Published,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Discovered => "discovered",
            ContentStatus::Selected => "selected",
            ContentStatus::Rejected => "rejected",
            ContentStatus::Published => "published",
        }
    }

    pub fn can_transition_to(self, next: ContentStatus) -> bool {
        use ContentStatus::*;
        matches!(
            (self, next),
            (Discovered, Selected)
                | (Discovered, Rejected)
                | (Rejected, Discovered)
                | (Rejected, Selected)
                | (Selected, Rejected)
                | (Selected, Discovered)
                | (Selected, Published)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ContentStatus::Published)
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown content status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for ContentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discovered" => Ok(ContentStatus::Discovered),
            "selected" => Ok(ContentStatus::Selected),
            "rejected" => Ok(ContentStatus::Rejected),
            "published" => Ok(ContentStatus::Published),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Which description variant the newsletter should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionSource {
    #[default]
    Original,
    Custom,
    Ai,
}

impl DescriptionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptionSource::Original => "original",
            DescriptionSource::Custom => "custom",
            DescriptionSource::Ai => "ai",
        }
    }

    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "custom" => DescriptionSource::Custom,
            "ai" => DescriptionSource::Ai,
            _ => DescriptionSource::Original,
        }
    }
}

/// Raw engagement counters as reported by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Engagement {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
}

impl Engagement {
    /// Ranking weight used to order candidates before persistence.
    pub fn weight(&self) -> i64 {
        self.views
            .saturating_add(self.likes.saturating_mul(5))
            .saturating_add(self.comments.saturating_mul(10))
    }
}

/// What a source tells us about the author of a candidate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreatorHint {
    pub name: String,
    pub platform_id: Option<String>,
    pub profile_url: Option<String>,
    pub avatar_url: Option<String>,
    pub follower_count: Option<i64>,
}

impl CreatorHint {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Per-item metadata that does not fit the main columns: alternate links
/// and original-author details.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SideChannel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotify_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apple_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashtag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

const NOTE_SEPARATOR: &str = " | ";

impl SideChannel {
    const KEYS: [&'static str; 7] = [
        "Author", "Link", "Spotify", "Apple", "Hashtag", "Type", "Source",
    ];

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }

    fn fields(&self) -> [(&'static str, Option<&String>); 7] {
        [
            (Self::KEYS[0], self.author.as_ref()),
            (Self::KEYS[1], self.external_url.as_ref()),
            (Self::KEYS[2], self.spotify_url.as_ref()),
            (Self::KEYS[3], self.apple_url.as_ref()),
            (Self::KEYS[4], self.hashtag.as_ref()),
            (Self::KEYS[5], self.media_kind.as_ref()),
            (Self::KEYS[6], self.source.as_ref()),
        ]
    }

    /// Legacy editorial-note rendering: `Key: value | Key: value`.
    /// A separator inside a value becomes ` / ` so the note reads back.
    pub fn to_note(&self) -> Option<String> {
        let parts: Vec<String> = self
            .fields()
            .iter()
            .filter_map(|(k, v)| v.map(|v| format!("{k}: {}", v.replace(NOTE_SEPARATOR, " / "))))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(NOTE_SEPARATOR))
        }
    }

    /// Read a legacy note back. Unknown keys and malformed segments are ignored.
    pub fn from_note(note: &str) -> Self {
        let mut out = SideChannel::default();
        for segment in note.split(NOTE_SEPARATOR) {
            let Some((key, value)) = segment.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let value = Some(value.to_string());
            match key.trim() {
                "Author" => out.author = value,
                "Link" => out.external_url = value,
                "Spotify" => out.spotify_url = value,
                "Apple" => out.apple_url = value,
                "Hashtag" => out.hashtag = value,
                "Type" => out.media_kind = value,
                "Source" => out.source = value,
                _ => {}
            }
        }
        out
    }
}

/// Normalized, not-yet-persisted record produced by a source adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCandidate {
    pub platform: Platform,
    pub source_name: String,
    pub title: String,
    pub canonical_url: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    /// Set when the source date was missing or unparseable and "now" was used.
    pub published_at_inferred: bool,
    pub thumbnail_url: Option<String>,
    pub engagement: Engagement,
    pub duration_seconds: Option<i64>,
    pub is_priority: bool,
    pub category_hint: Option<Category>,
    pub creator: CreatorHint,
    pub side_channel: SideChannel,
}

impl ContentCandidate {
    /// Minimal constructor; adapters fill the optional parts afterwards.
    pub fn new(
        platform: Platform,
        source_name: impl Into<String>,
        title: impl Into<String>,
        canonical_url: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        let source_name = source_name.into();
        Self {
            platform,
            creator: CreatorHint::named(source_name.clone()),
            source_name,
            title: title.into(),
            canonical_url: canonical_url.into(),
            description: String::new(),
            published_at,
            published_at_inferred: false,
            thumbnail_url: None,
            engagement: Engagement::default(),
            duration_seconds: None,
            is_priority: false,
            category_hint: None,
            side_channel: SideChannel::default(),
        }
    }

    /// Text the relevance classifier looks at.
    pub fn relevance_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    pub id: i64,
    pub name: String,
    pub platform: Platform,
    pub platform_id: Option<String>,
    pub profile_url: Option<String>,
    pub avatar_url: Option<String>,
    pub follower_count: Option<i64>,
    pub credibility_score: f64,
}

/// Creator lookup/creation request handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCreator {
    pub name: String,
    pub platform: Platform,
    pub platform_id: Option<String>,
    pub profile_url: Option<String>,
    pub avatar_url: Option<String>,
    pub follower_count: Option<i64>,
    pub credibility_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub platform: Platform,
    pub creator_id: Option<i64>,
    pub status: ContentStatus,
    pub category: Category,
    pub description: String,
    pub custom_description: Option<String>,
    pub ai_description: Option<String>,
    pub description_source: DescriptionSource,
    pub thumbnail_url: Option<String>,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub duration_seconds: Option<i64>,
    pub engagement_score: f64,
    pub published_date: DateTime<Utc>,
    pub editorial_note: Option<String>,
    pub side_channel: SideChannel,
    pub display_order: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl ContentItem {
    /// The description the newsletter should show, per `description_source`.
    pub fn effective_description(&self) -> &str {
        let chosen = match self.description_source {
            DescriptionSource::Custom => self.custom_description.as_deref(),
            DescriptionSource::Ai => self.ai_description.as_deref(),
            DescriptionSource::Original => None,
        };
        chosen.unwrap_or(&self.description)
    }
}

/// Insert request for a content item; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContentItem {
    pub title: String,
    pub url: String,
    pub platform: Platform,
    pub creator_id: Option<i64>,
    pub category: Category,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub engagement: Engagement,
    pub duration_seconds: Option<i64>,
    pub engagement_score: f64,
    pub published_date: DateTime<Utc>,
    pub side_channel: SideChannel,
}

/// Operator-trusted source. Always queried; its candidates skip classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrioritySource {
    pub platform: Platform,
    pub source_name: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// What an entity-scoped run searches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Athlete,
    Topic,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Athlete => "athlete",
            EntityKind::Topic => "topic",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown entity kind `{0}`")]
pub struct UnknownEntityKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "athlete" => Ok(EntityKind::Athlete),
            "topic" | "performance_topic" => Ok(EntityKind::Topic),
            other => Err(UnknownEntityKind(other.to_string())),
        }
    }
}

/// An athlete or performance topic with its own discovery searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub kind: EntityKind,
    pub name: String,
    pub handle: Option<String>,
    pub youtube_channel_id: Option<String>,
    /// Overrides the terms derived from name and handle.
    pub search_terms: Vec<String>,
}

/// Insert-or-update request keyed by `(kind, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntity {
    pub kind: EntityKind,
    pub name: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub youtube_channel_id: Option<String>,
    #[serde(default)]
    pub search_terms: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse_lenient(s: &str) -> Self {
        if s.eq_ignore_ascii_case("completed") {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        }
    }
}

/// Append-only audit row for one discovery invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRun {
    pub id: i64,
    pub platform: Platform,
    pub run_date: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub items_found: i64,
    pub items_saved: i64,
    pub items_skipped: i64,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub execution_seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDiscoveryRun {
    pub platform: Platform,
    pub window: DiscoveryWindow,
    pub items_found: i64,
    pub items_saved: i64,
    pub items_skipped: i64,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub execution_seconds: f64,
}

/// Stage counts reported by one discovery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub platform: Platform,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub found: usize,
    pub unique: usize,
    pub recent: usize,
    pub relevant: usize,
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub source_errors: usize,
    /// Entity runs only: content rows newly linked to the entity.
    #[serde(default)]
    pub linked: usize,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn empty(platform: Platform, window: &DiscoveryWindow) -> Self {
        Self {
            platform,
            window_start: window.start,
            window_end: window.end,
            found: 0,
            unique: 0,
            recent: 0,
            relevant: 0,
            saved: 0,
            skipped: 0,
            failed: 0,
            source_errors: 0,
            linked: 0,
            status: RunStatus::Completed,
            error: None,
        }
    }

    pub fn failed(platform: Platform, window: &DiscoveryWindow, error: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            error: Some(error.into()),
            ..Self::empty(platform, window)
        }
    }

    /// Human-readable block; the dashboard parses the `Saved:` line.
    pub fn render(&self) -> String {
        let mut out = format!(
            "[{}] {} .. {}\n  Found: {}\n  Unique: {}\n  Recent: {}\n  Relevant: {}\n  Saved: {}\n  Skipped: {}\n",
            self.platform,
            self.window_start.format("%Y-%m-%d %H:%M"),
            self.window_end.format("%Y-%m-%d %H:%M"),
            self.found,
            self.unique,
            self.recent,
            self.relevant,
            self.saved,
            self.skipped,
        );
        if self.failed > 0 {
            out.push_str(&format!("  Failed: {}\n", self.failed));
        }
        if self.source_errors > 0 {
            out.push_str(&format!("  Source errors: {}\n", self.source_errors));
        }
        if self.linked > 0 {
            out.push_str(&format!("  Linked: {}\n", self.linked));
        }
        out.push_str(&format!("  Status: {}", self.status.as_str()));
        if let Some(e) = &self.error {
            out.push_str(&format!(" ({e})"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parses_aliases() {
        assert_eq!("YouTube".parse::<Platform>().unwrap(), Platform::Youtube);
        assert_eq!("articles".parse::<Platform>().unwrap(), Platform::Article);
        assert!("tiktok".parse::<Platform>().is_err());
    }

    #[test]
    fn category_and_entity_kind_parse_strictly() {
        assert_eq!(" Race_Recap".parse::<Category>().unwrap(), Category::RaceRecap);
        assert_eq!("other".parse::<Category>().unwrap(), Category::Other);
        assert!("recipes".parse::<Category>().is_err());
        assert_eq!("performance_topic".parse::<EntityKind>().unwrap(), EntityKind::Topic);
        assert!("coach".parse::<EntityKind>().is_err());
    }

    #[test]
    fn status_transitions_follow_lifecycle() {
        use ContentStatus::*;
        assert!(Discovered.can_transition_to(Selected));
        assert!(Discovered.can_transition_to(Rejected));
        assert!(Rejected.can_transition_to(Discovered));
        assert!(Selected.can_transition_to(Published));
        assert!(!Discovered.can_transition_to(Published));
        assert!(!Rejected.can_transition_to(Published));
        assert!(!Published.can_transition_to(Discovered));
        assert!(!Published.can_transition_to(Rejected));
        assert!(Published.is_terminal());
    }

    #[test]
    fn side_channel_note_roundtrips_known_keys() {
        let sc = SideChannel {
            author: Some("u/runner".into()),
            external_url: Some("https://example.com/post".into()),
            ..SideChannel::default()
        };
        let note = sc.to_note().unwrap();
        assert_eq!(note, "Author: u/runner | Link: https://example.com/post");
        assert_eq!(SideChannel::from_note(&note), sc);
    }

    #[test]
    fn side_channel_note_survives_separator_in_values() {
        let sc = SideChannel {
            author: Some("Coach Ann | Hybrid Lab".into()),
            source: Some("rapidapi".into()),
            ..SideChannel::default()
        };
        let note = sc.to_note().unwrap();
        assert_eq!(note, "Author: Coach Ann / Hybrid Lab | Source: rapidapi");
        let back = SideChannel::from_note(&note);
        assert_eq!(back.author.as_deref(), Some("Coach Ann / Hybrid Lab"));
        assert_eq!(back.source.as_deref(), Some("rapidapi"));
    }

    #[test]
    fn side_channel_parse_ignores_garbage() {
        let sc = SideChannel::from_note("Spotify: https://open.spotify.com/x | nonsense | Mood: great");
        assert_eq!(sc.spotify_url.as_deref(), Some("https://open.spotify.com/x"));
        assert!(sc.author.is_none());
        assert!(SideChannel::default().to_note().is_none());
    }

    #[test]
    fn engagement_weight_favors_comments() {
        let a = Engagement { views: 100, likes: 0, comments: 0 };
        let b = Engagement { views: 0, likes: 0, comments: 11 };
        assert!(b.weight() > a.weight());
    }
}
