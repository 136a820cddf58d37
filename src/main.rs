//! Discovery service: binary entrypoint.
//! Boots the Axum HTTP server with the discovery runner, curation routes and
//! Prometheus metrics. Optional periodic discovery via `DISCOVERY_INTERVAL_SECS`.

use fitness_discovery::bootstrap::{init_tracing, Runtime};
use fitness_discovery::ingest::scheduler::{spawn_discovery_scheduler, DiscoverySchedulerCfg};
use fitness_discovery::metrics::Metrics;
use fitness_discovery::{create_router, AppState, Platform};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics = Metrics::init()?;
    let rt = Runtime::from_env().await?;
    if let Err(e) = rt.seed_priority_sources().await {
        tracing::warn!(error = %e, "priority source seed skipped");
    }

    let interval = std::env::var("DISCOVERY_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|s| *s > 0);
    if let Some(interval_secs) = interval {
        tracing::info!(interval_secs, "periodic discovery enabled");
        spawn_discovery_scheduler(
            DiscoverySchedulerCfg {
                interval_secs,
                timeout: rt.cfg.run.timeout(),
            },
            rt.runner.clone(),
            rt.catalog.clone(),
            Platform::ALL.to_vec(),
        );
    }

    let state = AppState {
        runner: rt.runner.clone(),
        catalog: rt.catalog.clone(),
        run_timeout: rt.cfg.run.timeout(),
        http: rt.http.clone(),
        instagram_web_base: rt.cfg.instagram.web_base.clone(),
        entity_lookback_days: rt.cfg.entity.lookback_days,
    };
    let router = create_router(state).merge(metrics.router());

    Ok(router.into())
}
