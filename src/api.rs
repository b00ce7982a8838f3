use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use tower_http::cors::CorsLayer;

use crate::ingest::error::IngestError;
use crate::ingest::staleness::StalenessPolicy;
use crate::ingest::types::ScheduleSnapshot;
use crate::ingest::Aggregator;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub staleness: StalenessPolicy,
}

impl AppState {
    pub fn new(aggregator: Aggregator, staleness: StalenessPolicy) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            staleness,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/games", get(refresh_games))
        .route("/api/games/cached", get(cached_games))
        .route("/api/schedule", get(schedule))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

pub struct ApiError(IngestError);

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, "request failed");
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Fetch every source now. Cache writes continue in the background.
async fn refresh_games(State(state): State<AppState>) -> Json<ScheduleSnapshot> {
    let outcome = state.aggregator.refresh_and_serve().await;
    Json(outcome.snapshot)
}

async fn cached_games(State(state): State<AppState>) -> Result<Json<ScheduleSnapshot>, ApiError> {
    Ok(Json(state.aggregator.cached_serve().await?))
}

/// Serve the cache, refreshing first when the last refresh is older than the policy allows.
async fn schedule(State(state): State<AppState>) -> Result<Json<ScheduleSnapshot>, ApiError> {
    let last = state.aggregator.fetch_date().await?;
    if state.staleness.is_stale(last.as_deref(), Utc::now()) {
        tracing::info!(fetch_date = ?last, "schedule is stale, refreshing");
        return Ok(Json(state.aggregator.refresh_and_serve().await.snapshot));
    }
    Ok(Json(state.aggregator.cached_serve().await?))
}
