// src/bootstrap.rs
//! Wiring shared by the HTTP service and the `discover` CLI.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Credentials, DiscoveryConfig};
use crate::ingest::config::load_priority_sources_default;
use crate::ingest::http::HttpClient;
use crate::ingest::pipeline::{ConfiguredCatalog, DiscoveryRunner, SourceCatalog};
use crate::relevance::{
    start_hot_reload_thread, RelevanceClassifier, RelevanceHandle, DEFAULT_RELEVANCE_CONFIG_PATH,
    ENV_RELEVANCE_CONFIG_PATH,
};
use crate::store::postgres::ENV_DATABASE_URL;
use crate::store::{ContentStore, MemoryStore, PgStore};

pub const DEFAULT_LOG_FILTER: &str = "fitness_discovery=info,warn";

/// `memory` selects the throwaway in-memory store; anything else needs Postgres.
pub const ENV_STORE: &str = "DISCOVERY_STORE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl StoreKind {
    pub fn from_env() -> Self {
        match std::env::var(ENV_STORE) {
            Ok(v) if v.trim().eq_ignore_ascii_case("memory") => StoreKind::Memory,
            _ => StoreKind::Postgres,
        }
    }
}

/// `RUST_LOG` filter, compact output; JSON lines when `LOG_FORMAT=json`.
/// A no-op when a subscriber is already installed (Shuttle installs one).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

pub struct Runtime {
    pub cfg: DiscoveryConfig,
    pub store: Arc<dyn ContentStore>,
    pub relevance: RelevanceHandle,
    pub runner: DiscoveryRunner,
    pub catalog: Arc<dyn SourceCatalog>,
    /// The catalog's client, shared with one-off fetches such as manual adds.
    pub http: HttpClient,
}

impl Runtime {
    /// Config, store, keywords, catalog. The store kind comes from `DISCOVERY_STORE`.
    pub async fn from_env() -> anyhow::Result<Self> {
        Self::with_store(StoreKind::from_env()).await
    }

    /// Postgres needs `DATABASE_URL` and fails without it. The in-memory store
    /// is seeded with priority sources right away since nothing else will.
    pub async fn with_store(kind: StoreKind) -> anyhow::Result<Self> {
        let cfg = DiscoveryConfig::load()?;
        let creds = Credentials::from_env();
        info!(
            youtube_key = creds.youtube_api_key.is_some(),
            rapidapi_key = creds.rapidapi_key.is_some(),
            "discovery config loaded"
        );

        let store: Arc<dyn ContentStore> = match kind {
            StoreKind::Postgres => {
                let url = std::env::var(ENV_DATABASE_URL)
                    .ok()
                    .filter(|u| !u.trim().is_empty())
                    .with_context(|| format!("{ENV_DATABASE_URL} is not set (use {ENV_STORE}=memory for a throwaway store)"))?;
                Arc::new(PgStore::connect(&url).await?)
            }
            StoreKind::Memory => {
                warn!("using in-memory store, nothing is persisted");
                Arc::new(MemoryStore::new())
            }
        };

        let relevance = RelevanceHandle::new(load_classifier());
        let path = std::env::var(ENV_RELEVANCE_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_RELEVANCE_CONFIG_PATH));
        start_hot_reload_thread(relevance.clone(), path);

        let runner = DiscoveryRunner::new(store.clone(), relevance.clone(), cfg.credibility.clone())
            .with_request_delay(cfg.run.request_delay());
        let configured = ConfiguredCatalog::new(cfg.clone(), creds).context("building HTTP client")?;
        let http = configured.http().clone();
        let catalog: Arc<dyn SourceCatalog> = Arc::new(configured);

        let rt = Self {
            cfg,
            store,
            relevance,
            runner,
            catalog,
            http,
        };
        if kind == StoreKind::Memory {
            rt.seed_priority_sources().await?;
        }
        Ok(rt)
    }

    /// Upsert the priority-source seed file, if one exists. Returns the count.
    pub async fn seed_priority_sources(&self) -> anyhow::Result<usize> {
        let sources = load_priority_sources_default()?;
        for s in &sources {
            self.store.upsert_priority_source(s).await?;
        }
        if !sources.is_empty() {
            info!(count = sources.len(), "priority sources seeded");
        }
        Ok(sources.len())
    }
}

/// Keyword file when present and valid, the built-in seed otherwise.
pub fn load_classifier() -> RelevanceClassifier {
    match RelevanceClassifier::from_toml() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "relevance config unavailable, using built-in keywords");
            RelevanceClassifier::default_seed()
        }
    }
}
