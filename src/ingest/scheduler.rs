// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::ingest::pipeline::{DiscoveryRunner, SourceCatalog};
use crate::model::{Platform, RunSummary};
use crate::window::DiscoveryWindow;

/// Run platforms one after another, each bounded by `timeout`. A run that
/// overruns is abandoned and recorded as failed with its partial counts; it is
/// not retried. A trailing window is re-anchored at the start of each run.
pub async fn run_platforms(
    runner: &DiscoveryRunner,
    catalog: &dyn SourceCatalog,
    platforms: &[Platform],
    window: &DiscoveryWindow,
    timeout: Duration,
) -> Vec<RunSummary> {
    let mut out = Vec::with_capacity(platforms.len());
    for &platform in platforms {
        out.push(runner.run_with_timeout(platform, catalog, window, timeout).await);
    }
    out
}

#[derive(Clone, Copy, Debug)]
pub struct DiscoverySchedulerCfg {
    pub interval_secs: u64,
    pub timeout: Duration,
}

/// Periodic background discovery over the trailing default window.
pub fn spawn_discovery_scheduler(
    cfg: DiscoverySchedulerCfg,
    runner: DiscoveryRunner,
    catalog: Arc<dyn SourceCatalog>,
    platforms: Vec<Platform>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cfg.interval_secs.max(1)));
        // The first tick fires immediately; skip it so startup is not a run.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let window = DiscoveryWindow::default_at(Utc::now());
            let summaries = run_platforms(&runner, catalog.as_ref(), &platforms, &window, cfg.timeout).await;
            let saved: usize = summaries.iter().map(|s| s.saved).sum();
            let failed = summaries.iter().filter(|s| s.error.is_some()).count();
            tracing::info!(target: "discovery", runs = summaries.len(), saved, failed, "scheduled discovery tick");
        }
    })
}
