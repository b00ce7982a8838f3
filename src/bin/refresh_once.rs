//! Runs one refresh cycle against the configured sources, waits for the cache
//! writes, and prints the merged schedule as JSON. Exits non-zero if any source failed.

use socker_schedules::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = AppConfig::load()?;
    let outcome = cfg.build_aggregator().refresh_and_serve().await;

    for f in &outcome.failures {
        tracing::error!(source = %f.source, error = %f.error, "source failed");
    }
    outcome.persisted.wait().await?;

    println!("{}", serde_json::to_string_pretty(&outcome.snapshot)?);

    if !outcome.failures.is_empty() {
        anyhow::bail!("{} source(s) failed", outcome.failures.len());
    }
    Ok(())
}
