// src/store/memory.rs
//! In-process store for tests and local runs without a database.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{ContentQuery, ContentStore, StoreError};
use crate::model::{
    ContentItem, ContentStatus, Creator, DescriptionSource, DiscoveryRun, Entity, NewContentItem, NewCreator,
    NewDiscoveryRun, NewEntity, Platform, PrioritySource,
};
use crate::window::DiscoveryWindow;

#[derive(Default)]
struct Inner {
    next_id: i64,
    creators: Vec<Creator>,
    items: BTreeMap<i64, ContentItem>,
    by_url: HashMap<String, i64>,
    priority: Vec<PrioritySource>,
    runs: Vec<DiscoveryRun>,
    entities: BTreeMap<i64, Entity>,
    /// `(entity_id, content_id)`
    links: BTreeSet<(i64, i64)>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// All operations run under one lock, so the URL check-and-insert is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_priority_sources(sources: Vec<PrioritySource>) -> Self {
        let store = Self::new();
        store.inner.lock().priority = sources;
        store
    }

    pub fn content_count(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn creators(&self) -> Vec<Creator> {
        self.inner.lock().creators.clone()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn active_priority_sources(&self, platform: Platform) -> Result<Vec<PrioritySource>, StoreError> {
        Ok(self
            .inner
            .lock()
            .priority
            .iter()
            .filter(|p| p.platform == platform && p.is_active)
            .cloned()
            .collect())
    }

    async fn upsert_priority_source(&self, source: &PrioritySource) -> Result<(), StoreError> {
        let mut g = self.inner.lock();
        let pos = g
            .priority
            .iter()
            .position(|p| p.platform == source.platform && p.source_name == source.source_name);
        match pos {
            Some(idx) => g.priority[idx] = source.clone(),
            None => g.priority.push(source.clone()),
        }
        Ok(())
    }

    async fn find_content_by_url(&self, url: &str) -> Result<Option<ContentItem>, StoreError> {
        let g = self.inner.lock();
        Ok(g.by_url.get(url).and_then(|id| g.items.get(id)).cloned())
    }

    async fn get_content(&self, id: i64) -> Result<Option<ContentItem>, StoreError> {
        Ok(self.inner.lock().items.get(&id).cloned())
    }

    async fn resolve_creator(&self, creator: &NewCreator) -> Result<Creator, StoreError> {
        let mut g = self.inner.lock();
        let by_platform_id = creator.platform_id.as_ref().and_then(|pid| {
            g.creators
                .iter()
                .position(|c| c.platform == creator.platform && c.platform_id.as_ref() == Some(pid))
        });
        let found = by_platform_id.or_else(|| {
            g.creators
                .iter()
                .position(|c| c.platform == creator.platform && c.name == creator.name)
        });

        if let Some(idx) = found {
            let existing = &mut g.creators[idx];
            if creator.follower_count.is_some() {
                existing.follower_count = creator.follower_count;
                existing.credibility_score = creator.credibility_score;
            }
            if existing.platform_id.is_none() {
                existing.platform_id = creator.platform_id.clone();
            }
            return Ok(existing.clone());
        }

        let id = g.next_id();
        let created = Creator {
            id,
            name: creator.name.clone(),
            platform: creator.platform,
            platform_id: creator.platform_id.clone(),
            profile_url: creator.profile_url.clone(),
            avatar_url: creator.avatar_url.clone(),
            follower_count: creator.follower_count,
            credibility_score: creator.credibility_score,
        };
        g.creators.push(created.clone());
        Ok(created)
    }

    async fn insert_content(&self, item: &NewContentItem) -> Result<Option<ContentItem>, StoreError> {
        let mut g = self.inner.lock();
        if g.by_url.contains_key(&item.url) {
            return Ok(None);
        }
        let id = g.next_id();
        let stored = ContentItem {
            id,
            title: item.title.clone(),
            url: item.url.clone(),
            platform: item.platform,
            creator_id: item.creator_id,
            status: ContentStatus::Discovered,
            category: item.category,
            description: item.description.clone(),
            custom_description: None,
            ai_description: None,
            description_source: DescriptionSource::Original,
            thumbnail_url: item.thumbnail_url.clone(),
            view_count: item.engagement.views,
            like_count: item.engagement.likes,
            comment_count: item.engagement.comments,
            duration_seconds: item.duration_seconds,
            engagement_score: item.engagement_score,
            published_date: item.published_date,
            editorial_note: item.side_channel.to_note(),
            side_channel: item.side_channel.clone(),
            display_order: None,
            created_at: Utc::now(),
        };
        g.by_url.insert(stored.url.clone(), id);
        g.items.insert(id, stored.clone());
        Ok(Some(stored))
    }

    async fn set_status(
        &self,
        id: i64,
        from: ContentStatus,
        to: ContentStatus,
    ) -> Result<ContentItem, StoreError> {
        let mut g = self.inner.lock();
        let item = g.items.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if item.status != from {
            return Err(StoreError::Conflict(format!(
                "item {id} is {}, expected {from}",
                item.status
            )));
        }
        item.status = to;
        Ok(item.clone())
    }

    async fn list_content(&self, query: &ContentQuery) -> Result<Vec<ContentItem>, StoreError> {
        let g = self.inner.lock();
        let mut out: Vec<ContentItem> = g
            .items
            .values()
            .filter(|i| query.platform.map_or(true, |p| i.platform == p))
            .filter(|i| query.status.map_or(true, |s| i.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.published_date.cmp(&a.published_date).then(b.id.cmp(&a.id)));
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn clear_content(&self, platform: Platform, window: &DiscoveryWindow) -> Result<u64, StoreError> {
        let mut g = self.inner.lock();
        let doomed: Vec<(i64, String)> = g
            .items
            .values()
            .filter(|i| i.platform == platform && window.contains(i.published_date))
            .map(|i| (i.id, i.url.clone()))
            .collect();
        for (id, url) in &doomed {
            g.items.remove(id);
            g.by_url.remove(url);
            g.links.retain(|(_, content_id)| content_id != id);
        }
        Ok(doomed.len() as u64)
    }

    async fn record_run(&self, run: &NewDiscoveryRun) -> Result<DiscoveryRun, StoreError> {
        let mut g = self.inner.lock();
        let id = g.next_id();
        let row = DiscoveryRun {
            id,
            platform: run.platform,
            run_date: Utc::now(),
            window_start: run.window.start,
            window_end: run.window.end,
            items_found: run.items_found,
            items_saved: run.items_saved,
            items_skipped: run.items_skipped,
            status: run.status,
            error_message: run.error_message.clone(),
            execution_seconds: run.execution_seconds,
        };
        g.runs.push(row.clone());
        Ok(row)
    }

    async fn list_runs(&self, platform: Option<Platform>, limit: usize) -> Result<Vec<DiscoveryRun>, StoreError> {
        let g = self.inner.lock();
        Ok(g.runs
            .iter()
            .rev()
            .filter(|r| platform.map_or(true, |p| r.platform == p))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn upsert_entity(&self, entity: &NewEntity) -> Result<Entity, StoreError> {
        let mut g = self.inner.lock();
        let existing = g
            .entities
            .values()
            .find(|e| e.kind == entity.kind && e.name == entity.name)
            .map(|e| e.id);
        let id = match existing {
            Some(id) => id,
            None => g.next_id(),
        };
        let row = Entity {
            id,
            kind: entity.kind,
            name: entity.name.clone(),
            handle: entity.handle.clone(),
            youtube_channel_id: entity.youtube_channel_id.clone(),
            search_terms: entity.search_terms.clone(),
        };
        g.entities.insert(id, row.clone());
        Ok(row)
    }

    async fn get_entity(&self, id: i64) -> Result<Option<Entity>, StoreError> {
        Ok(self.inner.lock().entities.get(&id).cloned())
    }

    async fn list_entities(&self) -> Result<Vec<Entity>, StoreError> {
        Ok(self.inner.lock().entities.values().cloned().collect())
    }

    async fn link_entity_content(&self, entity_id: i64, content_id: i64, _platform: Platform) -> Result<bool, StoreError> {
        let mut g = self.inner.lock();
        if !g.entities.contains_key(&entity_id) {
            return Err(StoreError::Backend(format!("entity {entity_id} does not exist")));
        }
        if !g.items.contains_key(&content_id) {
            return Err(StoreError::NotFound(content_id));
        }
        Ok(g.links.insert((entity_id, content_id)))
    }

    async fn entity_content(&self, entity_id: i64) -> Result<Vec<ContentItem>, StoreError> {
        let g = self.inner.lock();
        let mut out: Vec<ContentItem> = g
            .links
            .range((entity_id, i64::MIN)..=(entity_id, i64::MAX))
            .filter_map(|(_, content_id)| g.items.get(content_id).cloned())
            .collect();
        out.sort_by(|a, b| b.published_date.cmp(&a.published_date).then(b.id.cmp(&a.id)));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Engagement, SideChannel};

    fn new_item(url: &str) -> NewContentItem {
        NewContentItem {
            title: "t".into(),
            url: url.into(),
            platform: Platform::Article,
            creator_id: None,
            category: Category::Other,
            description: String::new(),
            thumbnail_url: None,
            engagement: Engagement::default(),
            duration_seconds: None,
            engagement_score: 0.0,
            published_date: Utc::now(),
            side_channel: SideChannel {
                author: Some("u/x".into()),
                ..SideChannel::default()
            },
        }
    }

    fn new_creator(name: &str, followers: Option<i64>, score: f64) -> NewCreator {
        NewCreator {
            name: name.into(),
            platform: Platform::Instagram,
            platform_id: Some(name.to_lowercase()),
            profile_url: None,
            avatar_url: None,
            follower_count: followers,
            credibility_score: score,
        }
    }

    #[tokio::test]
    async fn url_is_unique() {
        let s = MemoryStore::new();
        let first = s.insert_content(&new_item("https://x.test/a")).await.unwrap();
        assert!(first.is_some());
        assert_eq!(first.unwrap().editorial_note.as_deref(), Some("Author: u/x"));
        assert!(s.insert_content(&new_item("https://x.test/a")).await.unwrap().is_none());
        assert_eq!(s.content_count(), 1);
    }

    #[tokio::test]
    async fn creator_is_reused_and_refreshed() {
        let s = MemoryStore::new();
        let a = s.resolve_creator(&new_creator("Coach", Some(5_000), 0.5)).await.unwrap();
        let b = s.resolve_creator(&new_creator("Coach", None, 0.5)).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.follower_count, Some(5_000));
        let c = s.resolve_creator(&new_creator("Coach", Some(200_000), 0.9)).await.unwrap();
        assert_eq!(c.id, a.id);
        assert_eq!(c.credibility_score, 0.9);
        assert_eq!(s.creators().len(), 1);
    }

    #[tokio::test]
    async fn entity_links_are_unique_and_follow_clears() {
        let s = MemoryStore::new();
        let athlete = s
            .upsert_entity(&NewEntity {
                kind: crate::model::EntityKind::Athlete,
                name: "Lauren Weeks".into(),
                handle: Some("@laurenweeks".into()),
                youtube_channel_id: None,
                search_terms: vec![],
            })
            .await
            .unwrap();
        let item = s.insert_content(&new_item("https://x.test/a")).await.unwrap().unwrap();

        assert!(s.link_entity_content(athlete.id, item.id, Platform::Article).await.unwrap());
        assert!(!s.link_entity_content(athlete.id, item.id, Platform::Article).await.unwrap());
        assert_eq!(s.entity_content(athlete.id).await.unwrap().len(), 1);

        let window = DiscoveryWindow::default_at(Utc::now());
        s.clear_content(Platform::Article, &window).await.unwrap();
        assert!(s.entity_content(athlete.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_status_is_compare_and_set() {
        let s = MemoryStore::new();
        let item = s.insert_content(&new_item("https://x.test/a")).await.unwrap().unwrap();
        s.set_status(item.id, ContentStatus::Discovered, ContentStatus::Rejected)
            .await
            .unwrap();
        let err = s
            .set_status(item.id, ContentStatus::Discovered, ContentStatus::Selected)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(matches!(
            s.set_status(999, ContentStatus::Discovered, ContentStatus::Selected).await,
            Err(StoreError::NotFound(999))
        ));
    }
}
