// tests/api_http.rs
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use socker_schedules::ingest::cache::{CacheGateway, KvStore, MemoryStore};
use socker_schedules::ingest::registry::SourceRegistry;
use socker_schedules::ingest::staleness::StalenessPolicy;
use socker_schedules::ingest::transport::FixtureTransport;
use socker_schedules::ingest::types::{FetchStrategy, SourceConfig, SourceId};
use socker_schedules::ingest::Aggregator;
use socker_schedules::{create_router, AppState};
use tower::ServiceExt; // for `oneshot`

const URL: &str = "https://league.example/export";

fn app(store: Arc<MemoryStore>, transport: Arc<FixtureTransport>) -> Router {
    let registry = SourceRegistry::new(vec![SourceConfig {
        id: SourceId::new("kat"),
        display_name: "Kat".into(),
        strategy: FetchStrategy::CsvForm {
            url: URL.into(),
            body: "team=24".into(),
        },
        team_rewrites: Vec::new(),
    }])
    .unwrap();
    let agg = Aggregator::new(Arc::new(registry), transport, CacheGateway::new(store, "ns"));
    create_router(AppState::new(agg, StalenessPolicy::hours(12)))
}

fn fixture() -> Arc<FixtureTransport> {
    Arc::new(FixtureTransport::new().with_post(
        URL,
        "team=24",
        "Date,Time,field_name,home_team,visit_team\n9/23/2022,7:00  PM,Field 3,Team A,Team B\n",
    ))
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn health_is_ok() {
    let app = app(Arc::new(MemoryStore::new()), fixture());
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn games_endpoint_refreshes_and_returns_consumer_shape() {
    let app = app(Arc::new(MemoryStore::new()), fixture());
    let (status, body) = get_json(&app, "/api/games").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["fetchDate"].is_string(), "body: {body}");
    assert_eq!(
        body["games"],
        serde_json::json!([{
            "date": "2022-09-23 7:00PM",
            "who": "kat",
            "field": "Field 3",
            "home": "Team A",
            "away": "Team B"
        }])
    );
}

#[tokio::test]
async fn cached_endpoint_never_fetches() {
    let transport = fixture();
    let app = app(Arc::new(MemoryStore::new()), transport.clone());
    let (status, body) = get_json(&app, "/api/games/cached").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["games"], serde_json::json!([]));
    assert!(body["fetchDate"].is_null());
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn schedule_refreshes_only_when_stale() {
    let store = Arc::new(MemoryStore::new());
    let transport = fixture();
    let app = app(store.clone(), transport.clone());

    // No timestamp yet -> stale -> refresh.
    let (_, body) = get_json(&app, "/api/schedule").await;
    assert_eq!(body["games"].as_array().map(Vec::len), Some(1));
    assert_eq!(transport.call_count(), 1);
    // Let the background cache writes from that refresh land.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    // Fresh timestamp -> served from cache.
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    store.set("ns:fetch-date", now.clone()).await.unwrap();
    let (_, body) = get_json(&app, "/api/schedule").await;
    assert_eq!(body["fetchDate"], Value::String(now));
    assert_eq!(transport.call_count(), 1);

    // Old timestamp -> refresh again.
    store
        .set("ns:fetch-date", "2020-01-01T00:00:00.000Z".to_string())
        .await
        .unwrap();
    let _ = get_json(&app, "/api/schedule").await;
    assert_eq!(transport.call_count(), 2);
}
