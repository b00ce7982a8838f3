// src/lib.rs
// Public library surface for the service binary and integration tests.

pub mod api;
pub mod config;
pub mod ingest;
pub mod metrics;

pub use crate::api::{create_router, AppState};
pub use crate::config::AppConfig;
pub use crate::ingest::{Aggregator, Game, ScheduleSnapshot};

use crate::ingest::scheduler::{spawn_refresh_scheduler, RefreshSchedulerCfg};
use tracing::info;

/// Load configuration and build the full HTTP app (API routes + `/metrics` when available).
/// Call after tracing init, inside a tokio runtime.
pub fn app(metrics: Option<&crate::metrics::Metrics>) -> anyhow::Result<axum::Router> {
    let cfg = AppConfig::load()?;
    let state = AppState::new(cfg.build_aggregator(), cfg.pipeline.staleness);
    if let Some(every) = cfg.pipeline.refresh_every {
        let _ = spawn_refresh_scheduler(
            state.aggregator.clone(),
            RefreshSchedulerCfg {
                check_every: every,
                staleness: cfg.pipeline.staleness,
            },
        );
        info!(every_secs = every.as_secs(), "background refresh enabled");
    }
    let mut router = create_router(state);
    if let Some(m) = metrics {
        router = router.merge(m.router());
    }
    info!(
        stale_after_hours = cfg.pipeline.staleness.max_age().num_hours(),
        "schedule service ready"
    );
    Ok(router)
}
