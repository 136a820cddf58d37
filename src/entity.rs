// src/entity.rs
//! Entity-scoped discovery for tracked athletes and performance topics.
//!
//! An entity run reuses the platform pipeline: `EntityScope` swaps the
//! catalog's configured targets for searches built from the entity, and the
//! runner links whatever it finds (new or already stored) to that entity.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::ingest::http::FetchError;
use crate::ingest::pipeline::{DiscoveryJob, DiscoveryRunner, SourceCatalog};
use crate::model::{Entity, EntityKind, Platform, PrioritySource, RunSummary};
use crate::window::DiscoveryWindow;

const ATHLETE_PLATFORMS: &[Platform] = &[Platform::Youtube, Platform::Podcast, Platform::Article];
const TOPIC_PLATFORMS: &[Platform] = &[Platform::Youtube, Platform::Podcast, Platform::Article, Platform::Reddit];

/// Platforms searched for an entity of this kind, in run order.
pub fn platforms(kind: EntityKind) -> &'static [Platform] {
    match kind {
        EntityKind::Athlete => ATHLETE_PLATFORMS,
        EntityKind::Topic => TOPIC_PLATFORMS,
    }
}

/// Bare search terms: the entity's own list when set, otherwise derived from
/// the name (and handle for athletes). Deduplicated case-insensitively.
pub fn search_terms(entity: &Entity, scope_word: &str) -> Vec<String> {
    let mut raw: Vec<String> = entity
        .search_terms
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if raw.is_empty() {
        match entity.kind {
            EntityKind::Athlete => {
                raw.push(entity.name.trim().to_string());
                if let Some(h) = entity.handle.as_deref() {
                    raw.push(h.trim().trim_start_matches('@').to_string());
                }
            }
            EntityKind::Topic => {
                raw.push(format!("{} {}", scope_word, entity.name.trim().to_lowercase()));
            }
        }
    }
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for t in raw {
        if !t.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(&t)) {
            out.push(t);
        }
    }
    out
}

/// Queries sent to the search endpoints. Athlete names are ambiguous on
/// their own, so the scope word is appended unless already present.
pub fn queries(entity: &Entity, scope_word: &str) -> Vec<String> {
    let scope = scope_word.trim();
    search_terms(entity, scope)
        .into_iter()
        .map(|t| match entity.kind {
            EntityKind::Athlete if !scope.is_empty() && !t.to_lowercase().contains(&scope.to_lowercase()) => {
                format!("{t} {scope}")
            }
            _ => t,
        })
        .collect()
}

/// Catalog view that answers every platform with the entity's searches.
pub struct EntityScope<'a> {
    catalog: &'a dyn SourceCatalog,
    entity: &'a Entity,
}

impl<'a> EntityScope<'a> {
    pub fn new(catalog: &'a dyn SourceCatalog, entity: &'a Entity) -> Self {
        Self { catalog, entity }
    }
}

impl SourceCatalog for EntityScope<'_> {
    fn job(
        &self,
        platform: Platform,
        _priority: &[PrioritySource],
        window: &DiscoveryWindow,
    ) -> Result<DiscoveryJob, FetchError> {
        self.catalog.entity_job(self.entity, platform, window)
    }

    fn entity_job(&self, entity: &Entity, platform: Platform, window: &DiscoveryWindow) -> Result<DiscoveryJob, FetchError> {
        self.catalog.entity_job(entity, platform, window)
    }
}

/// Run every platform searched for `entity`, one audit row each. `limit`
/// bounds each platform run separately.
pub async fn discover(
    runner: &DiscoveryRunner,
    catalog: &dyn SourceCatalog,
    entity: &Entity,
    window: &DiscoveryWindow,
    now: DateTime<Utc>,
    limit: Option<Duration>,
) -> Vec<RunSummary> {
    let scope = EntityScope::new(catalog, entity);
    let mut out = Vec::new();
    for &platform in platforms(entity.kind) {
        tracing::info!(entity = %entity.name, kind = entity.kind.as_str(), %platform, "entity discovery");
        out.push(runner.run_bounded(platform, &scope, window, now, limit).await);
    }
    out
}
