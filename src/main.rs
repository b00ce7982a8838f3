//! Schedule Service: binary entrypoint
//! Boots the Axum HTTP server, wiring config, cache, routes, and metrics.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use socker_schedules::metrics::Metrics;

/// Compact logs, filtered by `RUST_LOG` (default: this crate at info, others at warn).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("socker_schedules=info,warn"));

    // The runtime may have installed a subscriber already.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = %e, "metrics disabled");
            None
        }
    };

    let router = socker_schedules::app(metrics.as_ref())?;
    Ok(router.into())
}
