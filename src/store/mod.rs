// src/store/mod.rs
//! Persistence boundary for creators, content items, priority sources and
//! discovery-run audit rows.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::model::{
    ContentItem, ContentStatus, Creator, DiscoveryRun, Entity, NewContentItem, NewCreator, NewDiscoveryRun,
    NewEntity, Platform, PrioritySource,
};
use crate::window::DiscoveryWindow;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("content item {0} not found")]
    NotFound(i64),
    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition {
        from: ContentStatus,
        to: ContentStatus,
    },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Errors that make a whole run pointless, as opposed to one bad row.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_) => StoreError::Unavailable(e.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Filter for listing content items.
#[derive(Debug, Clone, Default)]
pub struct ContentQuery {
    pub platform: Option<Platform>,
    pub status: Option<ContentStatus>,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Cheap connectivity check run before a discovery run starts.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn active_priority_sources(&self, platform: Platform) -> Result<Vec<PrioritySource>, StoreError>;

    /// Insert or update by `(platform, source_name)`.
    async fn upsert_priority_source(&self, source: &PrioritySource) -> Result<(), StoreError>;

    async fn find_content_by_url(&self, url: &str) -> Result<Option<ContentItem>, StoreError>;

    async fn get_content(&self, id: i64) -> Result<Option<ContentItem>, StoreError>;

    /// Find by natural key, creating on first sight. A later sighting with a
    /// follower count refreshes the count and the credibility score.
    async fn resolve_creator(&self, creator: &NewCreator) -> Result<Creator, StoreError>;

    /// Insert with status `discovered`. `None` when the URL is already stored.
    async fn insert_content(&self, item: &NewContentItem) -> Result<Option<ContentItem>, StoreError>;

    /// Compare-and-set status change; `Conflict` when the item is no longer in `from`.
    async fn set_status(
        &self,
        id: i64,
        from: ContentStatus,
        to: ContentStatus,
    ) -> Result<ContentItem, StoreError>;

    async fn list_content(&self, query: &ContentQuery) -> Result<Vec<ContentItem>, StoreError>;

    /// Delete items of `platform` published inside `window`; returns the count.
    async fn clear_content(&self, platform: Platform, window: &DiscoveryWindow) -> Result<u64, StoreError>;

    async fn record_run(&self, run: &NewDiscoveryRun) -> Result<DiscoveryRun, StoreError>;

    /// Newest first.
    async fn list_runs(&self, platform: Option<Platform>, limit: usize) -> Result<Vec<DiscoveryRun>, StoreError>;

    /// Insert or update by `(kind, name)`.
    async fn upsert_entity(&self, entity: &NewEntity) -> Result<Entity, StoreError>;

    async fn get_entity(&self, id: i64) -> Result<Option<Entity>, StoreError>;

    async fn list_entities(&self) -> Result<Vec<Entity>, StoreError>;

    /// Link a content row to an entity. `false` when the link already existed.
    async fn link_entity_content(&self, entity_id: i64, content_id: i64, platform: Platform) -> Result<bool, StoreError>;

    /// Items linked to an entity, newest first.
    async fn entity_content(&self, entity_id: i64) -> Result<Vec<ContentItem>, StoreError>;
}
