// src/ingest/mod.rs
pub mod aggregator;
pub mod cache;
pub mod error;
pub mod normalize;
pub mod providers;
pub mod registry;
pub mod scheduler;
pub mod staleness;
pub mod transport;
pub mod types;

pub use aggregator::{merge_sorted, Aggregator, RefreshOutcome, SourceFailure};
pub use cache::{CacheGateway, FileStore, KvStore, MemoryStore};
pub use error::IngestError;
pub use registry::SourceRegistry;
pub use types::{FetchStrategy, Game, ScheduleSnapshot, SourceConfig, SourceId};

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("schedule_fetch_total", "Source fetches attempted.");
        describe_counter!(
            "schedule_fetch_errors_total",
            "Source fetches that failed (transport, status, parse or layout)."
        );
        describe_counter!("schedule_games_total", "Games produced by successful fetches.");
        describe_counter!("schedule_rows_total", "Rows parsed from upstream payloads.");
        describe_counter!(
            "schedule_cache_write_errors_total",
            "Cache writes that failed after being issued."
        );
        describe_histogram!("schedule_fetch_ms", "Per-source fetch time in milliseconds.");
        describe_histogram!("schedule_parse_ms", "Upstream payload parse time in milliseconds.");
        describe_counter!(
            "schedule_scheduled_refresh_total",
            "Refresh cycles started by the background scheduler."
        );
        describe_gauge!(
            "schedule_last_refresh_ts",
            "Unix ts when the last refresh cycle finished."
        );
    });
}
