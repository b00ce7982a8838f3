// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use tokio::task::JoinHandle;

use crate::ingest::staleness::StalenessPolicy;
use crate::ingest::Aggregator;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefreshSchedulerCfg {
    /// How often the cached timestamp is checked.
    pub check_every: Duration,
    pub staleness: StalenessPolicy,
}

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Fresh,
    Refreshed { games: usize, failed: usize },
}

/// Refresh once if the cached timestamp is stale under `policy`.
pub async fn refresh_if_stale(agg: &Aggregator, policy: &StalenessPolicy) -> Tick {
    let last = match agg.fetch_date().await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(target: "ingest", error = %e, "fetch date unreadable, treating as stale");
            None
        }
    };
    if !policy.is_stale(last.as_deref(), Utc::now()) {
        return Tick::Fresh;
    }

    let outcome = agg.refresh_and_serve().await;
    counter!("schedule_scheduled_refresh_total").increment(1);
    Tick::Refreshed {
        games: outcome.snapshot.games.len(),
        failed: outcome.failures.len(),
    }
}

/// Spawn a background task that refreshes whenever the cache goes stale.
pub fn spawn_refresh_scheduler(agg: Arc<Aggregator>, cfg: RefreshSchedulerCfg) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.check_every);
        loop {
            ticker.tick().await;
            let tick = refresh_if_stale(&agg, &cfg.staleness).await;
            tracing::debug!(target: "ingest", ?tick, "refresh scheduler tick");
        }
    })
}
