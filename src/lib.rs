// src/lib.rs
// Public library surface for the service, the CLI and integration tests.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod credibility;
pub mod curation;
pub mod entity;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod persist;
pub mod relevance;
pub mod scoring;
pub mod store;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::ingest::pipeline::{ConfiguredCatalog, DiscoveryRunner, FixedCatalog, SourceCatalog};
pub use crate::model::{ContentCandidate, Platform, RunSummary};
pub use crate::store::{ContentStore, MemoryStore, PgStore, StoreError};
pub use crate::window::DiscoveryWindow;
