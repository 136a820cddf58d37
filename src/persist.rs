// src/persist.rs
//! Persistence gate: idempotency check, creator resolution, scored insert.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::credibility::CredibilityConfig;
use crate::ingest::clean_description;
use crate::model::{ContentCandidate, ContentItem, NewContentItem, NewCreator, Platform};
use crate::scoring::engagement_score;
use crate::store::{ContentStore, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    Saved(ContentItem),
    /// URL already stored, including a lost insert race.
    Skipped,
}

#[derive(Clone)]
pub struct PersistenceGate {
    store: Arc<dyn ContentStore>,
    credibility: Arc<CredibilityConfig>,
}

impl PersistenceGate {
    pub fn new(store: Arc<dyn ContentStore>, credibility: Arc<CredibilityConfig>) -> Self {
        Self { store, credibility }
    }

    pub async fn is_stored(&self, url: &str) -> Result<bool, StoreError> {
        Ok(self.stored(url).await?.is_some())
    }

    pub async fn stored(&self, url: &str) -> Result<Option<ContentItem>, StoreError> {
        self.store.find_content_by_url(url).await
    }

    /// Attach a stored item to a tracked entity; `false` when already linked.
    pub async fn link(&self, entity_id: i64, content_id: i64, platform: Platform) -> Result<bool, StoreError> {
        self.store.link_entity_content(entity_id, content_id, platform).await
    }

    /// Resolve the creator and insert the item as `discovered`. Existing rows are
    /// never modified.
    pub async fn persist(&self, c: &ContentCandidate, now: DateTime<Utc>) -> Result<PersistOutcome, StoreError> {
        let name = if c.creator.name.trim().is_empty() {
            c.source_name.trim()
        } else {
            c.creator.name.trim()
        };
        let creator = self
            .store
            .resolve_creator(&NewCreator {
                name: name.to_string(),
                platform: c.platform,
                platform_id: c.creator.platform_id.clone(),
                profile_url: c.creator.profile_url.clone(),
                avatar_url: c.creator.avatar_url.clone(),
                follower_count: c.creator.follower_count,
                credibility_score: self.credibility.score_for(name, c.platform, c.creator.follower_count),
            })
            .await?;

        let item = NewContentItem {
            title: c.title.clone(),
            url: c.canonical_url.clone(),
            platform: c.platform,
            creator_id: Some(creator.id),
            category: c.category_hint.unwrap_or_default(),
            description: clean_description(&c.description),
            thumbnail_url: c.thumbnail_url.clone(),
            engagement: c.engagement,
            duration_seconds: c.duration_seconds,
            engagement_score: engagement_score(&c.engagement, creator.credibility_score, c.published_at, now),
            published_date: c.published_at,
            side_channel: c.side_channel.clone(),
        };

        Ok(match self.store.insert_content(&item).await? {
            Some(saved) => PersistOutcome::Saved(saved),
            None => PersistOutcome::Skipped,
        })
    }
}
