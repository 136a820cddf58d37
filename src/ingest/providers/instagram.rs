// src/ingest/providers/instagram.rs
//! Instagram hashtag media through a RapidAPI scraper, plus Open Graph
//! metadata for single posts added by hand.
//!
//! The upstream payload shape differs between scraper versions, so records are
//! read from `serde_json::Value` with several fallbacks per field.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::config::InstagramConfig;
use crate::ingest::dates::from_unix;
use crate::ingest::http::{FetchError, HttpClient};
use crate::ingest::providers::{first_str, json_i64};
use crate::ingest::types::{SourceAdapter, SourceTarget};
use crate::ingest::{clean_description, clean_text, truncate_chars};
use crate::model::{ContentCandidate, CreatorHint, Engagement, Platform, SideChannel};

const TITLE_MAX_CHARS: usize = 100;
const PAGE_DESCRIPTION_MAX_CHARS: usize = 500;

pub struct InstagramAdapter {
    http: HttpClient,
    cfg: InstagramConfig,
    api_key: String,
}

impl InstagramAdapter {
    pub fn new(http: HttpClient, cfg: InstagramConfig, api_key: String) -> Self {
        Self { http, cfg, api_key }
    }

    fn passes_floor(&self, item: &Value) -> bool {
        let e = engagement_of(item);
        e.likes >= self.cfg.min_likes || e.comments >= self.cfg.min_comments
    }
}

/// Media array from any of the known response shapes.
pub fn media_items(body: &Value) -> Vec<Value> {
    for path in ["/data/items", "/items", "/data/medias", "/data/recent/sections", "/data"] {
        if let Some(arr) = body.pointer(path).and_then(Value::as_array) {
            return arr.iter().flat_map(unwrap_section).collect();
        }
    }
    Vec::new()
}

/// "Sections" wrap media in `layout_content.medias[].media`.
fn unwrap_section(v: &Value) -> Vec<Value> {
    match v.pointer("/layout_content/medias").and_then(Value::as_array) {
        Some(medias) => medias.iter().filter_map(|m| m.get("media").cloned()).collect(),
        None => vec![v.clone()],
    }
}

fn caption_of(item: &Value) -> String {
    first_str(
        item,
        &["caption/text", "caption", "edge_media_to_caption/edges/0/node/text"],
    )
    .unwrap_or_default()
    .to_string()
}

fn engagement_of(item: &Value) -> Engagement {
    let pick = |keys: &[&str]| keys.iter().find_map(|k| json_i64(item.pointer(&format!("/{k}")))).unwrap_or(0);
    Engagement {
        views: pick(&["play_count", "view_count", "video_view_count"]),
        likes: pick(&["like_count", "edge_liked_by/count", "edge_media_preview_like/count"]),
        comments: pick(&["comment_count", "edge_media_to_comment/count"]),
    }
}

fn media_kind(item: &Value) -> Option<&'static str> {
    let product = item.get("product_type").and_then(Value::as_str).unwrap_or_default();
    let is_video = json_i64(item.get("media_type")) == Some(2)
        || item.get("is_video").and_then(Value::as_bool).unwrap_or(false);
    match (product, is_video) {
        ("clips", _) => Some("Reel"),
        (_, true) => Some("Video"),
        _ => None,
    }
}

/// First non-empty caption line, capped for use as a title.
pub fn caption_title(caption: &str) -> Option<String> {
    let line = caption.lines().map(clean_text).find(|l| !l.is_empty())?;
    Some(truncate_chars(&line, TITLE_MAX_CHARS))
}

fn shortcode_regex() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"instagram\.com/(?:p|reel|tv)/([A-Za-z0-9_-]+)").unwrap())
}

fn author_regex() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^([^@\s]+) on Instagram").unwrap())
}

/// Shortcode of a post, reel or IGTV link.
pub fn post_shortcode(url: &str) -> Option<String> {
    shortcode_regex()
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Canonical post URL; reels and IGTV collapse onto `/p/`.
pub fn post_url(shortcode: &str) -> String {
    format!("https://www.instagram.com/p/{shortcode}/")
}

/// Open Graph fields of a public post page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostPage {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    /// Username taken from a "name on Instagram: ..." title.
    pub author: Option<String>,
}

fn og_selectors() -> &'static [Selector; 3] {
    static SEL: OnceCell<[Selector; 3]> = OnceCell::new();
    SEL.get_or_init(|| {
        [
            Selector::parse(r#"meta[property="og:title"]"#).unwrap(),
            Selector::parse(r#"meta[property="og:description"]"#).unwrap(),
            Selector::parse(r#"meta[property="og:image"]"#).unwrap(),
        ]
    })
}

pub fn parse_post_page(html: &str) -> PostPage {
    let doc = Html::parse_document(html);
    let content = |sel: &Selector| {
        doc.select(sel)
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            .find(|c| !c.is_empty())
            .map(String::from)
    };
    let [title_sel, desc_sel, image_sel] = og_selectors();
    let title = content(title_sel);
    let author = title
        .as_deref()
        .and_then(|t| author_regex().captures(t))
        .map(|c| c[1].to_string());
    PostPage {
        author,
        title,
        description: content(desc_sel).map(|d| truncate_chars(&d, PAGE_DESCRIPTION_MAX_CHARS)),
        image: content(image_sel),
    }
}

/// Fetch `{web_base}/p/{shortcode}/` and read its Open Graph tags.
pub async fn fetch_post_page(http: &HttpClient, web_base: &str, shortcode: &str) -> Result<PostPage, FetchError> {
    let url = format!("{}/p/{shortcode}/", web_base.trim_end_matches('/'));
    let html = http.get_text(&url, &[], &[]).await?;
    Ok(parse_post_page(&html))
}

#[async_trait]
impl SourceAdapter for InstagramAdapter {
    type Raw = Value;

    fn name(&self) -> &'static str {
        "instagram"
    }

    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn fetch(&self, target: &SourceTarget) -> Result<Vec<Value>, FetchError> {
        let tag = target.locator.trim_start_matches('#');
        let url = format!("{}/api/v1/hashtag_medias", self.cfg.api_base.trim_end_matches('/'));
        let body = self
            .http
            .get_json(
                &url,
                &[("query", tag.to_string())],
                &[
                    ("x-rapidapi-host", self.cfg.api_host.clone()),
                    ("x-rapidapi-key", self.api_key.clone()),
                ],
            )
            .await?;
        let items = media_items(&body);
        let total = items.len();
        let kept: Vec<Value> = items
            .into_iter()
            .filter(|it| self.passes_floor(it))
            .take(target.limit)
            .collect();
        tracing::debug!(hashtag = tag, total, kept = kept.len(), "instagram engagement floor applied");
        Ok(kept)
    }

    fn normalize(&self, item: Value, target: &SourceTarget, now: DateTime<Utc>) -> Option<ContentCandidate> {
        let code = first_str(&item, &["code", "shortcode"])?;
        let url = post_url(code);
        let username = first_str(&item, &["user/username", "owner/username"]).map(String::from);
        let caption = caption_of(&item);
        let title = caption_title(&caption).or_else(|| username.as_ref().map(|u| format!("@{u} on Instagram")))?;

        let (published_at, inferred) = match json_i64(item.get("taken_at"))
            .or_else(|| json_i64(item.get("taken_at_timestamp")))
            .and_then(|s| from_unix(s as f64))
        {
            Some(ts) => (ts, false),
            None => {
                tracing::warn!(%url, "instagram media without timestamp, using now");
                (now, true)
            }
        };

        let tag = target.locator.trim_start_matches('#');
        let source_name = username.as_ref().map(|u| format!("@{u}")).unwrap_or_else(|| format!("#{tag}"));

        let mut c = ContentCandidate::new(Platform::Instagram, source_name.clone(), title, url, published_at);
        c.published_at_inferred = inferred;
        c.description = clean_description(&caption);
        c.thumbnail_url = first_str(
            &item,
            &["image_versions2/candidates/0/url", "thumbnail_url", "display_url", "thumbnail_src"],
        )
        .map(String::from);
        c.engagement = engagement_of(&item);
        c.duration_seconds = item
            .get("video_duration")
            .and_then(Value::as_f64)
            .map(|d| d.round() as i64);
        c.is_priority = target.marks_priority();
        c.category_hint = target.category.or(self.cfg.category);
        c.creator = CreatorHint {
            name: source_name,
            platform_id: username.clone(),
            profile_url: username.as_ref().map(|u| format!("https://www.instagram.com/{u}/")),
            avatar_url: first_str(&item, &["user/profile_pic_url", "owner/profile_pic_url"]).map(String::from),
            follower_count: json_i64(item.pointer("/user/follower_count")),
        };
        c.side_channel = SideChannel {
            author: first_str(&item, &["user/full_name", "owner/full_name"]).map(String::from),
            hashtag: Some(format!("#{tag}")),
            media_kind: media_kind(&item).map(String::from),
            ..SideChannel::default()
        };
        Some(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> InstagramAdapter {
        InstagramAdapter::new(HttpClient::with_defaults().unwrap(), InstagramConfig::default(), "k".into())
    }

    #[test]
    fn finds_items_in_each_shape() {
        assert_eq!(media_items(&json!({"data": {"items": [{"code": "a"}]}})).len(), 1);
        assert_eq!(media_items(&json!({"items": [{"code": "a"}, {"code": "b"}]})).len(), 2);
        assert_eq!(media_items(&json!({"data": [{"code": "a"}]})).len(), 1);
        let sections = json!({"data": {"recent": {"sections": [
            {"layout_content": {"medias": [{"media": {"code": "x"}}, {"media": {"code": "y"}}]}}
        ]}}});
        assert_eq!(media_items(&sections).len(), 2);
        assert!(media_items(&json!({"status": "fail"})).is_empty());
    }

    #[test]
    fn engagement_floor() {
        let a = adapter();
        assert!(a.passes_floor(&json!({"like_count": 50, "comment_count": 0})));
        assert!(a.passes_floor(&json!({"like_count": 1, "comment_count": 5})));
        assert!(!a.passes_floor(&json!({"like_count": 49, "comment_count": 4})));
    }

    #[test]
    fn normalizes_reel() {
        let item = json!({
            "code": "C0de", "taken_at": 1736157600, "media_type": 2, "product_type": "clips",
            "caption": {"text": "\n  Sub-60 at Hyrox Berlin!  \nFull splits below #hyrox"},
            "like_count": 900, "comment_count": 40, "play_count": 12000,
            "user": {"username": "hyrox_runner", "full_name": "Alex R", "follower_count": 15000}
        });
        let c = adapter()
            .normalize(item, &SourceTarget::new(crate::ingest::types::TargetKind::Hashtag, "#hyrox", "hyrox"), Utc::now())
            .unwrap();
        assert_eq!(c.canonical_url, "https://www.instagram.com/p/C0de/");
        assert_eq!(c.title, "Sub-60 at Hyrox Berlin!");
        assert_eq!(c.source_name, "@hyrox_runner");
        assert_eq!(c.creator.platform_id.as_deref(), Some("hyrox_runner"));
        assert_eq!(c.creator.follower_count, Some(15000));
        assert_eq!(c.engagement.views, 12000);
        assert_eq!(c.side_channel.hashtag.as_deref(), Some("#hyrox"));
        assert_eq!(c.side_channel.media_kind.as_deref(), Some("Reel"));
        assert!(!c.published_at_inferred);
    }

    #[test]
    fn item_without_code_is_dropped() {
        let target = SourceTarget::new(crate::ingest::types::TargetKind::Hashtag, "#hyrox", "hyrox");
        assert!(adapter().normalize(json!({"caption": "x"}), &target, Utc::now()).is_none());
    }

    #[test]
    fn long_caption_is_capped() {
        let t = caption_title(&"a".repeat(300)).unwrap();
        assert_eq!(t.chars().count(), 100);
        assert!(caption_title("   \n ").is_none());
    }

    #[test]
    fn shortcodes_from_post_reel_and_tv_links() {
        assert_eq!(post_shortcode("https://www.instagram.com/p/C1a-B_2/?igsh=x").as_deref(), Some("C1a-B_2"));
        assert_eq!(post_shortcode("instagram.com/reel/Xyz9/").as_deref(), Some("Xyz9"));
        assert_eq!(post_shortcode("https://instagram.com/tv/T1/").as_deref(), Some("T1"));
        assert_eq!(post_shortcode("https://www.instagram.com/hyrox/"), None);
        assert_eq!(post_url("Xyz9"), "https://www.instagram.com/p/Xyz9/");
    }

    #[test]
    fn post_page_open_graph() {
        let long = "d".repeat(600);
        let html = format!(
            r#"<html><head>
            <meta property="og:title" content="hyrox_runner on Instagram: &quot;Sub-60&quot;">
            <meta property="og:description" content="{long}">
            <meta property="og:image" content="https://cdn.test/p.jpg">
            </head></html>"#
        );
        let page = parse_post_page(&html);
        assert_eq!(page.title.as_deref(), Some("hyrox_runner on Instagram: \"Sub-60\""));
        assert_eq!(page.author.as_deref(), Some("hyrox_runner"));
        assert_eq!(page.description.map(|d| d.chars().count()), Some(500));
        assert_eq!(page.image.as_deref(), Some("https://cdn.test/p.jpg"));

        assert_eq!(parse_post_page("<html><title>Login</title></html>"), PostPage::default());
    }
}
