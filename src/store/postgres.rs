// src/store/postgres.rs
//! Postgres-backed store. URL uniqueness is enforced by the `content_items_url_key`
//! constraint; inserts use `ON CONFLICT (url) DO NOTHING`.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use super::{ContentQuery, ContentStore, StoreError};
use crate::model::{
    Category, ContentItem, ContentStatus, Creator, DescriptionSource, DiscoveryRun, Entity, EntityKind,
    NewContentItem, NewCreator, NewDiscoveryRun, NewEntity, Platform, PrioritySource, RunStatus, SideChannel,
};
use crate::window::DiscoveryWindow;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

const CONTENT_COLUMNS: &str = "id, title, url, platform, creator_id, status, category, description, \
     custom_description, ai_description, description_source, thumbnail_url, view_count, like_count, \
     comment_count, duration_seconds, engagement_score, published_date, editorial_note, side_channel, \
     display_order, created_at";

const CREATOR_COLUMNS: &str =
    "id, name, platform, platform_id, profile_url, avatar_url, follower_count, credibility_score";

const ENTITY_COLUMNS: &str = "id, kind, name, handle, youtube_channel_id, search_terms";

const RUN_COLUMNS: &str = "id, platform, run_date, window_start, window_end, items_found, items_saved, \
     items_skipped, status, error_message, execution_seconds";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and apply embedded migrations.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .context("connecting to postgres")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("running migrations")?;
        Ok(Self { pool })
    }

    /// Connect using `DATABASE_URL`.
    pub async fn from_env() -> anyhow::Result<Self> {
        let url = std::env::var(ENV_DATABASE_URL)
            .with_context(|| format!("{ENV_DATABASE_URL} is not set"))?;
        Self::connect(&url).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_platform(s: &str) -> Result<Platform, StoreError> {
    Platform::from_str(s).map_err(|e| StoreError::Backend(e.to_string()))
}

fn row_to_item(row: &PgRow) -> Result<ContentItem, StoreError> {
    let platform: String = row.try_get("platform")?;
    let status: String = row.try_get("status")?;
    let category: String = row.try_get("category")?;
    let description_source: String = row.try_get("description_source")?;
    let side_channel: Json<SideChannel> = row.try_get("side_channel")?;
    Ok(ContentItem {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        platform: parse_platform(&platform)?,
        creator_id: row.try_get("creator_id")?,
        status: ContentStatus::from_str(&status).map_err(|e| StoreError::Backend(e.to_string()))?,
        category: Category::parse_lenient(&category),
        description: row.try_get("description")?,
        custom_description: row.try_get("custom_description")?,
        ai_description: row.try_get("ai_description")?,
        description_source: DescriptionSource::parse_lenient(&description_source),
        thumbnail_url: row.try_get("thumbnail_url")?,
        view_count: row.try_get("view_count")?,
        like_count: row.try_get("like_count")?,
        comment_count: row.try_get("comment_count")?,
        duration_seconds: row.try_get("duration_seconds")?,
        engagement_score: row.try_get("engagement_score")?,
        published_date: row.try_get("published_date")?,
        editorial_note: row.try_get("editorial_note")?,
        side_channel: side_channel.0,
        display_order: row.try_get("display_order")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_creator(row: &PgRow) -> Result<Creator, StoreError> {
    let platform: String = row.try_get("platform")?;
    Ok(Creator {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        platform: parse_platform(&platform)?,
        platform_id: row.try_get("platform_id")?,
        profile_url: row.try_get("profile_url")?,
        avatar_url: row.try_get("avatar_url")?,
        follower_count: row.try_get("follower_count")?,
        credibility_score: row.try_get("credibility_score")?,
    })
}

fn row_to_run(row: &PgRow) -> Result<DiscoveryRun, StoreError> {
    let platform: String = row.try_get("platform")?;
    let status: String = row.try_get("status")?;
    Ok(DiscoveryRun {
        id: row.try_get("id")?,
        platform: parse_platform(&platform)?,
        run_date: row.try_get("run_date")?,
        window_start: row.try_get("window_start")?,
        window_end: row.try_get("window_end")?,
        items_found: row.try_get("items_found")?,
        items_saved: row.try_get("items_saved")?,
        items_skipped: row.try_get("items_skipped")?,
        status: RunStatus::parse_lenient(&status),
        error_message: row.try_get("error_message")?,
        execution_seconds: row.try_get("execution_seconds")?,
    })
}

fn row_to_entity(row: &PgRow) -> Result<Entity, StoreError> {
    let kind: String = row.try_get("kind")?;
    Ok(Entity {
        id: row.try_get("id")?,
        kind: EntityKind::from_str(&kind).map_err(|e| StoreError::Backend(e.to_string()))?,
        name: row.try_get("name")?,
        handle: row.try_get("handle")?,
        youtube_channel_id: row.try_get("youtube_channel_id")?,
        search_terms: row.try_get("search_terms")?,
    })
}

#[async_trait]
impl ContentStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn active_priority_sources(&self, platform: Platform) -> Result<Vec<PrioritySource>, StoreError> {
        let rows = sqlx::query_as::<_, (String, Option<String>, Option<String>, bool)>(
            r#"
            SELECT source_name, source_url, external_id, is_active
            FROM priority_sources
            WHERE platform = $1 AND is_active
            ORDER BY source_name
            "#,
        )
        .bind(platform.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(source_name, source_url, external_id, is_active)| PrioritySource {
                platform,
                source_name,
                source_url,
                external_id,
                is_active,
            })
            .collect())
    }

    async fn upsert_priority_source(&self, source: &PrioritySource) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO priority_sources (platform, source_name, source_url, external_id, is_active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (platform, source_name) DO UPDATE
            SET source_url = EXCLUDED.source_url,
                external_id = EXCLUDED.external_id,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(source.platform.as_str())
        .bind(&source.source_name)
        .bind(&source.source_url)
        .bind(&source.external_id)
        .bind(source.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_content_by_url(&self, url: &str) -> Result<Option<ContentItem>, StoreError> {
        let sql = format!("SELECT {CONTENT_COLUMNS} FROM content_items WHERE url = $1");
        let row = sqlx::query(&sql).bind(url).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn get_content(&self, id: i64) -> Result<Option<ContentItem>, StoreError> {
        let sql = format!("SELECT {CONTENT_COLUMNS} FROM content_items WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn resolve_creator(&self, creator: &NewCreator) -> Result<Creator, StoreError> {
        let platform = creator.platform.as_str();

        let mut existing = None;
        if let Some(pid) = &creator.platform_id {
            let sql = format!("SELECT {CREATOR_COLUMNS} FROM creators WHERE platform = $1 AND platform_id = $2");
            existing = sqlx::query(&sql)
                .bind(platform)
                .bind(pid)
                .fetch_optional(&self.pool)
                .await?;
        }
        if existing.is_none() {
            let sql = format!("SELECT {CREATOR_COLUMNS} FROM creators WHERE platform = $1 AND name = $2");
            existing = sqlx::query(&sql)
                .bind(platform)
                .bind(&creator.name)
                .fetch_optional(&self.pool)
                .await?;
        }

        if let Some(row) = existing {
            let found = row_to_creator(&row)?;
            if creator.follower_count.is_none() && found.platform_id.is_some() {
                return Ok(found);
            }
            let sql = format!(
                r#"
                UPDATE creators
                SET follower_count = COALESCE($2, follower_count),
                    credibility_score = CASE WHEN $2 IS NULL THEN credibility_score ELSE $3 END,
                    platform_id = COALESCE(platform_id, $4),
                    updated_at = now()
                WHERE id = $1
                RETURNING {CREATOR_COLUMNS}
                "#
            );
            let row = sqlx::query(&sql)
                .bind(found.id)
                .bind(creator.follower_count)
                .bind(creator.credibility_score)
                .bind(&creator.platform_id)
                .fetch_one(&self.pool)
                .await?;
            return row_to_creator(&row);
        }

        let sql = format!(
            r#"
            INSERT INTO creators (name, platform, platform_id, profile_url, avatar_url, follower_count, credibility_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (name, platform) DO UPDATE
            SET follower_count = COALESCE(EXCLUDED.follower_count, creators.follower_count),
                updated_at = now()
            RETURNING {CREATOR_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&creator.name)
            .bind(platform)
            .bind(&creator.platform_id)
            .bind(&creator.profile_url)
            .bind(&creator.avatar_url)
            .bind(creator.follower_count)
            .bind(creator.credibility_score)
            .fetch_one(&self.pool)
            .await?;
        row_to_creator(&row)
    }

    async fn insert_content(&self, item: &NewContentItem) -> Result<Option<ContentItem>, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO content_items (
                title, url, platform, creator_id, status, category, description, thumbnail_url,
                view_count, like_count, comment_count, duration_seconds, engagement_score,
                published_date, editorial_note, side_channel
            )
            VALUES ($1, $2, $3, $4, 'discovered', $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (url) DO NOTHING
            RETURNING {CONTENT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&item.title)
            .bind(&item.url)
            .bind(item.platform.as_str())
            .bind(item.creator_id)
            .bind(item.category.as_str())
            .bind(&item.description)
            .bind(&item.thumbnail_url)
            .bind(item.engagement.views)
            .bind(item.engagement.likes)
            .bind(item.engagement.comments)
            .bind(item.duration_seconds)
            .bind(item.engagement_score)
            .bind(item.published_date)
            .bind(item.side_channel.to_note())
            .bind(Json(&item.side_channel))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn set_status(
        &self,
        id: i64,
        from: ContentStatus,
        to: ContentStatus,
    ) -> Result<ContentItem, StoreError> {
        let sql = format!(
            r#"
            UPDATE content_items
            SET status = $3, updated_at = now()
            WHERE id = $1 AND status = $2
            RETURNING {CONTENT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => row_to_item(&row),
            None => match self.get_content(id).await? {
                None => Err(StoreError::NotFound(id)),
                Some(current) => Err(StoreError::Conflict(format!(
                    "item {id} is {}, expected {from}",
                    current.status
                ))),
            },
        }
    }

    async fn list_content(&self, query: &ContentQuery) -> Result<Vec<ContentItem>, StoreError> {
        let sql = format!(
            r#"
            SELECT {CONTENT_COLUMNS}
            FROM content_items
            WHERE ($1::text IS NULL OR platform = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY published_date DESC, id DESC
            LIMIT $3
            "#
        );
        let limit = query.limit.map(|l| l as i64).unwrap_or(i64::MAX);
        let rows = sqlx::query(&sql)
            .bind(query.platform.map(|p| p.as_str()))
            .bind(query.status.map(|s| s.as_str()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_item).collect()
    }

    async fn clear_content(&self, platform: Platform, window: &DiscoveryWindow) -> Result<u64, StoreError> {
        let res = sqlx::query(
            r#"
            DELETE FROM content_items
            WHERE platform = $1 AND published_date BETWEEN $2 AND $3
            "#,
        )
        .bind(platform.as_str())
        .bind(window.start)
        .bind(window.end)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn record_run(&self, run: &NewDiscoveryRun) -> Result<DiscoveryRun, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO discovery_runs (
                platform, window_start, window_end, items_found, items_saved, items_skipped,
                status, error_message, execution_seconds
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {RUN_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(run.platform.as_str())
            .bind(run.window.start)
            .bind(run.window.end)
            .bind(run.items_found)
            .bind(run.items_saved)
            .bind(run.items_skipped)
            .bind(run.status.as_str())
            .bind(&run.error_message)
            .bind(run.execution_seconds)
            .fetch_one(&self.pool)
            .await?;
        row_to_run(&row)
    }

    async fn list_runs(&self, platform: Option<Platform>, limit: usize) -> Result<Vec<DiscoveryRun>, StoreError> {
        let sql = format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM discovery_runs
            WHERE ($1::text IS NULL OR platform = $1)
            ORDER BY run_date DESC, id DESC
            LIMIT $2
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(platform.map(|p| p.as_str()))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_run).collect()
    }

    async fn upsert_entity(&self, entity: &NewEntity) -> Result<Entity, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO entities (kind, name, handle, youtube_channel_id, search_terms)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (kind, name) DO UPDATE
            SET handle = EXCLUDED.handle,
                youtube_channel_id = EXCLUDED.youtube_channel_id,
                search_terms = EXCLUDED.search_terms,
                updated_at = now()
            RETURNING {ENTITY_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(entity.kind.as_str())
            .bind(&entity.name)
            .bind(&entity.handle)
            .bind(&entity.youtube_channel_id)
            .bind(&entity.search_terms)
            .fetch_one(&self.pool)
            .await?;
        row_to_entity(&row)
    }

    async fn get_entity(&self, id: i64) -> Result<Option<Entity>, StoreError> {
        let sql = format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_entity).transpose()
    }

    async fn list_entities(&self) -> Result<Vec<Entity>, StoreError> {
        let sql = format!("SELECT {ENTITY_COLUMNS} FROM entities ORDER BY kind, name");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_entity).collect()
    }

    async fn link_entity_content(&self, entity_id: i64, content_id: i64, platform: Platform) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            INSERT INTO entity_content (entity_id, content_id, platform)
            VALUES ($1, $2, $3)
            ON CONFLICT (entity_id, content_id) DO NOTHING
            "#,
        )
        .bind(entity_id)
        .bind(content_id)
        .bind(platform.as_str())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn entity_content(&self, entity_id: i64) -> Result<Vec<ContentItem>, StoreError> {
        let sql = format!(
            r#"
            SELECT {CONTENT_COLUMNS}
            FROM content_items
            WHERE id IN (SELECT content_id FROM entity_content WHERE entity_id = $1)
            ORDER BY published_date DESC, id DESC
            "#
        );
        let rows = sqlx::query(&sql).bind(entity_id).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_item).collect()
    }
}
