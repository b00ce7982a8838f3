// src/ingest/aggregator.rs
//! Runs every source's fetch concurrently, writes results through to the
//! cache, and merges everything into one time-ordered list.
//!
//! All fetches of a cycle are polled together on the calling task; each one
//! is its own failure boundary. A failed source is logged, reported in
//! [`RefreshOutcome::failures`], and its previous cache entry is left alone.
//! Cache writes are spawned as soon as a source succeeds and are not awaited
//! before the merged result is returned, so a cache-only read right after a
//! refresh can briefly see older per-source entries next to the new
//! timestamp. Await [`RefreshOutcome::persisted`] to close that window.

use std::sync::Arc;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use futures_util::future::join_all;
use metrics::{counter, gauge, histogram};

use crate::ingest::cache::{CacheGateway, PersistHandle, PersistHandles};
use crate::ingest::error::IngestError;
use crate::ingest::normalize::normalize;
use crate::ingest::providers::{csv_form, html_scrape};
use crate::ingest::registry::SourceRegistry;
use crate::ingest::transport::Transport;
use crate::ingest::types::{FetchStrategy, Game, ScheduleSnapshot, SourceConfig, SourceId};

#[derive(Debug)]
pub struct SourceFailure {
    pub source: SourceId,
    pub error: IngestError,
}

pub struct RefreshOutcome {
    pub snapshot: ScheduleSnapshot,
    pub failures: Vec<SourceFailure>,
    /// Cache writes issued by this cycle (games per source + timestamp).
    pub persisted: PersistHandles,
}

#[derive(Clone)]
pub struct Aggregator {
    registry: Arc<SourceRegistry>,
    transport: Arc<dyn Transport>,
    cache: CacheGateway,
}

impl Aggregator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        transport: Arc<dyn Transport>,
        cache: CacheGateway,
    ) -> Self {
        Self {
            registry,
            transport,
            cache,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &CacheGateway {
        &self.cache
    }

    /// Fetch and normalize one source. No caching.
    pub async fn fetch_source(&self, source: &SourceConfig) -> Result<Vec<Game>, IngestError> {
        let transport = self.transport.as_ref();
        match &source.strategy {
            FetchStrategy::CsvForm { url, body } => csv_form::fetch_rows(transport, url, body)
                .await?
                .iter()
                .map(|row| normalize(source, row))
                .collect(),
            FetchStrategy::HtmlScrape { url, filter_name } => {
                html_scrape::fetch_games(transport, source, url, filter_name).await
            }
        }
    }

    async fn refresh_source(
        &self,
        source: &SourceConfig,
    ) -> (Result<Vec<Game>, IngestError>, Option<PersistHandle>) {
        let t0 = Instant::now();
        counter!("schedule_fetch_total").increment(1);
        let res = self.fetch_source(source).await;
        histogram!("schedule_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match res {
            Ok(games) => {
                tracing::info!(
                    target: "ingest",
                    source = %source.id,
                    strategy = source.strategy.tag(),
                    games = games.len(),
                    "source fetched"
                );
                counter!("schedule_games_total").increment(games.len() as u64);
                let handle = match self.cache.put(&source.id, &games) {
                    Ok(h) => Some(h),
                    Err(e) => {
                        tracing::warn!(target: "ingest", source = %source.id, error = %e, "cache write not issued");
                        None
                    }
                };
                (Ok(games), handle)
            }
            Err(e) => {
                counter!("schedule_fetch_errors_total").increment(1);
                tracing::warn!(
                    target: "ingest",
                    source = %source.id,
                    strategy = source.strategy.tag(),
                    error = %e,
                    "source fetch failed; keeping previous cache entry"
                );
                (Err(e), None)
            }
        }
    }

    /// Fetch every source, write through to the cache, and return the merged list.
    pub async fn refresh_and_serve(&self) -> RefreshOutcome {
        crate::ingest::ensure_metrics_described();

        // Stamped at cycle start, stored only once every fetch has settled:
        // a cycle dropped mid-flight must not mark the cache fresh.
        let fetch_date = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let results = join_all(self.registry.iter().map(|s| self.refresh_source(s))).await;

        let mut persisted = PersistHandles::default();
        persisted.push(self.cache.put_fetch_date(&fetch_date));

        let mut per_source = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (source, (res, handle)) in self.registry.iter().zip(results) {
            if let Some(h) = handle {
                persisted.push(h);
            }
            match res {
                Ok(games) => per_source.push(games),
                Err(error) => failures.push(SourceFailure {
                    source: source.id.clone(),
                    error,
                }),
            }
        }

        let games = merge_sorted(per_source);
        gauge!("schedule_last_refresh_ts").set(Utc::now().timestamp() as f64);
        tracing::info!(
            target: "ingest",
            games = games.len(),
            failed = failures.len(),
            fetch_date = %fetch_date,
            "refresh cycle complete"
        );

        RefreshOutcome {
            snapshot: ScheduleSnapshot {
                games,
                fetch_date: Some(fetch_date),
            },
            failures,
            persisted,
        }
    }

    /// Serve from the cache only. Sources with no (or unreadable) entry add no games.
    pub async fn cached_serve(&self) -> Result<ScheduleSnapshot, IngestError> {
        let reads = join_all(self.registry.iter().map(|s| async move {
            match self.cache.get(s).await {
                Ok(Some(games)) => games,
                Ok(None) => {
                    tracing::debug!(target: "ingest", source = %s.id, "no cached games");
                    Vec::new()
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", source = %s.id, error = %e, "cached games unreadable");
                    Vec::new()
                }
            }
        }))
        .await;

        let fetch_date = self.cache.get_fetch_date().await?;
        Ok(ScheduleSnapshot {
            games: merge_sorted(reads),
            fetch_date,
        })
    }

    pub async fn fetch_date(&self) -> Result<Option<String>, IngestError> {
        self.cache.get_fetch_date().await
    }
}

/// Flatten per-source lists and stable-sort by start time. Games whose date
/// cannot be parsed go last, in input order.
pub fn merge_sorted(per_source: Vec<Vec<Game>>) -> Vec<Game> {
    let mut games: Vec<Game> = per_source.into_iter().flatten().collect();
    games.sort_by_cached_key(|g| {
        let ts = g.starts_at();
        (ts.is_none(), ts)
    });
    games
}
