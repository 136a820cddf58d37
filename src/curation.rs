// src/curation.rs
//! Editor-facing operations: status changes, clear-and-rediscover and
//! Instagram posts added by hand.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::ingest::http::HttpClient;
use crate::ingest::providers::instagram::{fetch_post_page, post_shortcode, post_url, PostPage};
use crate::model::{Category, ContentCandidate, ContentItem, ContentStatus, CreatorHint, Platform, SideChannel};
use crate::persist::{PersistOutcome, PersistenceGate};
use crate::store::{ContentStore, StoreError};
use crate::window::DiscoveryWindow;

const UNKNOWN_INSTAGRAM_CREATOR: &str = "Instagram User";

/// Move an item to `to` if the lifecycle allows it from its current status.
pub async fn change_status(store: &dyn ContentStore, id: i64, to: ContentStatus) -> Result<ContentItem, StoreError> {
    let item = store.get_content(id).await?.ok_or(StoreError::NotFound(id))?;
    if item.status == to {
        return Ok(item);
    }
    if !item.status.can_transition_to(to) {
        return Err(StoreError::InvalidTransition { from: item.status, to });
    }
    let updated = store.set_status(id, item.status, to).await?;
    tracing::info!(id, from = %item.status, to = %to, "content status changed");
    Ok(updated)
}

/// Delete items of each platform published inside `window`. A later discovery
/// run over the same window may recreate them.
pub async fn clear_content(
    store: &dyn ContentStore,
    platforms: &[Platform],
    window: &DiscoveryWindow,
) -> Result<BTreeMap<Platform, u64>, StoreError> {
    let mut out = BTreeMap::new();
    for &platform in platforms {
        if out.contains_key(&platform) {
            continue;
        }
        let n = store.clear_content(platform, window).await?;
        tracing::warn!(%platform, deleted = n, start = %window.start, end = %window.end, "cleared content for re-discovery");
        out.insert(platform, n);
    }
    Ok(out)
}

/// A post an editor found themselves. Title and description override what
/// the post page says.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManualPost {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
}

#[derive(Debug, thiserror::Error)]
pub enum ManualAddError {
    #[error("not an Instagram post link: {0}")]
    InvalidUrl(String),
    #[error("post already stored: {0}")]
    AlreadyStored(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Store one Instagram post as `discovered`. Page metadata is best effort:
/// Instagram often serves a login wall, in which case the post is saved with
/// whatever the editor supplied.
pub async fn add_instagram_post(
    gate: &PersistenceGate,
    http: &HttpClient,
    web_base: &str,
    post: &ManualPost,
    now: DateTime<Utc>,
) -> Result<ContentItem, ManualAddError> {
    let code = post_shortcode(&post.url).ok_or_else(|| ManualAddError::InvalidUrl(post.url.clone()))?;
    let url = post_url(&code);
    if gate.stored(&url).await?.is_some() {
        return Err(ManualAddError::AlreadyStored(url));
    }

    let page = match fetch_post_page(http, web_base, &code).await {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!(%url, error = %e, "instagram post metadata unavailable");
            PostPage::default()
        }
    };

    let given = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);
    let title = given(&post.title)
        .or(page.title)
        .unwrap_or_else(|| format!("Instagram Post by {}", page.author.as_deref().unwrap_or("Unknown")));
    let creator = page.author.clone().unwrap_or_else(|| UNKNOWN_INSTAGRAM_CREATOR.to_string());

    let mut c = ContentCandidate::new(Platform::Instagram, creator.clone(), title, url.clone(), now);
    c.published_at_inferred = true;
    c.description = given(&post.description).or(page.description).unwrap_or_default();
    c.thumbnail_url = page.image;
    c.category_hint = Some(post.category.unwrap_or_default());
    c.creator = CreatorHint {
        name: creator,
        platform_id: page.author.clone(),
        profile_url: page.author.as_ref().map(|u| format!("https://www.instagram.com/{u}/")),
        ..CreatorHint::default()
    };
    c.side_channel = SideChannel {
        author: Some(format!("@{}", page.author.as_deref().unwrap_or("unknown"))),
        source: Some("manual".into()),
        ..SideChannel::default()
    };

    match gate.persist(&c, now).await? {
        PersistOutcome::Saved(item) => {
            tracing::info!(id = item.id, %url, "instagram post added");
            Ok(item)
        }
        PersistOutcome::Skipped => Err(ManualAddError::AlreadyStored(url)),
    }
}
