// src/ingest/cache.rs
//! Cache gateway over an external key-value store.
//!
//! Keys: `<namespace>:<source id>` holds the source's games as JSON (older
//! deployments stored the raw CSV export there instead), and
//! `<namespace>:fetch-date` holds the ISO-8601 time of the last refresh.
//! Writes are spawned and never awaited by the gateway itself; callers get a
//! [`PersistHandle`] they may await when they need durability.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::ingest::error::IngestError;
use crate::ingest::providers::csv_form::games_from_csv;
use crate::ingest::types::{FetchStrategy, Game, SourceConfig, SourceId};

pub const DEFAULT_NAMESPACE: &str = "socker-schedules";
const FETCH_DATE_KEY: &str = "fetch-date";

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, IngestError>;
    async fn set(&self, key: &str, value: String) -> Result<(), IngestError>;
}

/// Process-local store. Used in tests and when no cache directory is configured.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, IngestError> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), IngestError> {
        self.inner.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// One file per key under `root`. Values are replaced via write-then-rename
/// so readers never see a half-written entry.
pub struct FileStore {
    root: PathBuf,
    seq: AtomicU64,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Distinct keys map to distinct files: bytes outside `[A-Za-z0-9._-]`
    /// are percent-encoded (`ns:kat` -> `ns%3Akat.cache`).
    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        for b in key.bytes() {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.') {
                name.push(char::from(b));
            } else {
                name.push_str(&format!("%{b:02X}"));
            }
        }
        self.root.join(format!("{name}.cache"))
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, IngestError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(IngestError::Cache(format!("read {key}: {e}"))),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), IngestError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| IngestError::Cache(format!("create {}: {e}", self.root.display())))?;

        let path = self.path_for(key);
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp{n}"));
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| IngestError::Cache(format!("write {key}: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| IngestError::Cache(format!("rename {key}: {e}")))
    }
}

/// An in-flight cache write.
pub struct PersistHandle {
    key: String,
    task: JoinHandle<Result<(), IngestError>>,
}

impl PersistHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn wait(self) -> Result<(), IngestError> {
        self.task
            .await
            .map_err(|e| IngestError::Cache(format!("persist task for {} failed: {e}", self.key)))?
    }
}

/// Cache writes issued during one refresh cycle.
#[derive(Default)]
pub struct PersistHandles(Vec<PersistHandle>);

impl PersistHandles {
    pub fn push(&mut self, h: PersistHandle) {
        self.0.push(h);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Await every write; returns the first failure after all have settled.
    pub async fn wait(self) -> Result<(), IngestError> {
        let mut first_err = None;
        for h in self.0 {
            if let Err(e) = h.wait().await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[derive(Clone)]
pub struct CacheGateway {
    store: Arc<dyn KvStore>,
    namespace: String,
}

impl CacheGateway {
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn source_key(&self, id: &SourceId) -> String {
        format!("{}:{}", self.namespace, id)
    }

    pub fn fetch_date_key(&self) -> String {
        format!("{}:{}", self.namespace, FETCH_DATE_KEY)
    }

    fn spawn_set(&self, key: String, value: String) -> PersistHandle {
        let store = Arc::clone(&self.store);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let res = store.set(&task_key, value).await;
            if let Err(e) = &res {
                counter!("schedule_cache_write_errors_total").increment(1);
                tracing::warn!(target: "ingest", key = %task_key, error = %e, "cache write failed");
            }
            res
        });
        PersistHandle { key, task }
    }

    /// Overwrite the source's entry with `games`.
    pub fn put(&self, id: &SourceId, games: &[Game]) -> Result<PersistHandle, IngestError> {
        let value = serde_json::to_string(games)
            .map_err(|e| IngestError::Cache(format!("encode games for {id}: {e}")))?;
        Ok(self.spawn_set(self.source_key(id), value))
    }

    pub fn put_fetch_date(&self, timestamp: &str) -> PersistHandle {
        self.spawn_set(self.fetch_date_key(), timestamp.to_string())
    }

    /// Cached games for `source`; `Ok(None)` when nothing was ever stored.
    pub async fn get(&self, source: &SourceConfig) -> Result<Option<Vec<Game>>, IngestError> {
        let Some(raw) = self.store.get(&self.source_key(&source.id)).await? else {
            return Ok(None);
        };
        decode_entry(source, &raw).map(Some)
    }

    pub async fn get_fetch_date(&self) -> Result<Option<String>, IngestError> {
        Ok(self
            .store
            .get(&self.fetch_date_key())
            .await?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }
}

/// JSON game list, or a legacy raw CSV export for csv-form sources.
fn decode_entry(source: &SourceConfig, raw: &str) -> Result<Vec<Game>, IngestError> {
    if raw.trim_start().starts_with('[') {
        return serde_json::from_str(raw)
            .map_err(|e| IngestError::Parse(format!("cached games for {}: {e}", source.id)));
    }
    match &source.strategy {
        FetchStrategy::CsvForm { .. } => games_from_csv(source, raw),
        FetchStrategy::HtmlScrape { .. } => Err(IngestError::Parse(format!(
            "cached value for {} is not a game list",
            source.id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_source(id: &str) -> SourceConfig {
        SourceConfig {
            id: SourceId::new(id),
            display_name: id.to_string(),
            strategy: FetchStrategy::CsvForm {
                url: "http://league".into(),
                body: String::new(),
            },
            team_rewrites: Vec::new(),
        }
    }

    fn game(date: &str) -> Game {
        Game {
            date: date.into(),
            who: "kat".into(),
            field: "F".into(),
            home: "A".into(),
            away: "B".into(),
        }
    }

    #[tokio::test]
    async fn absent_key_is_none_not_error() {
        let gw = CacheGateway::new(Arc::new(MemoryStore::new()), DEFAULT_NAMESPACE);
        assert!(gw.get(&csv_source("kat")).await.unwrap().is_none());
        assert!(gw.get_fetch_date().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_then_get_after_wait() {
        let store = Arc::new(MemoryStore::new());
        let gw = CacheGateway::new(store.clone(), "ns");
        let src = csv_source("kat");
        gw.put(&src.id, &[game("2022-09-23 7:00PM")]).unwrap().wait().await.unwrap();
        gw.put_fetch_date("2022-09-20T10:00:00.000Z").wait().await.unwrap();

        assert_eq!(store.keys().await, vec!["ns:fetch-date", "ns:kat"]);
        assert_eq!(gw.get(&src).await.unwrap().unwrap(), vec![game("2022-09-23 7:00PM")]);
        assert_eq!(
            gw.get_fetch_date().await.unwrap().as_deref(),
            Some("2022-09-20T10:00:00.000Z")
        );
    }

    #[tokio::test]
    async fn legacy_raw_csv_values_are_normalized_on_read() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                "ns:kat",
                "Date,Time,field_name,home_team,visit_team\n9/23/2022,7:00  PM,Field 3,Team A,Team B\n"
                    .to_string(),
            )
            .await
            .unwrap();
        let gw = CacheGateway::new(store, "ns");
        let games = gw.get(&csv_source("kat")).await.unwrap().unwrap();
        assert_eq!(games[0].date, "2022-09-23 7:00PM");
        assert_eq!(games[0].who, "kat");
    }

    #[tokio::test]
    async fn file_store_round_trip_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileStore::new(dir.path().join("cache"));
        assert!(fs.get("ns:kat").await.unwrap().is_none());
        fs.set("ns:kat", "[]".into()).await.unwrap();
        fs.set("ns:kat", "[1]".into()).await.unwrap();
        assert_eq!(fs.get("ns:kat").await.unwrap().as_deref(), Some("[1]"));
        assert!(dir.path().join("cache").join("ns%3Akat.cache").exists());
    }

    #[tokio::test]
    async fn file_store_keeps_similar_keys_apart() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileStore::new(dir.path());
        fs.set("ns:kat", "colon".into()).await.unwrap();
        fs.set("ns_kat", "underscore".into()).await.unwrap();
        fs.set("ns%3Akat", "literal".into()).await.unwrap();

        assert_eq!(fs.get("ns:kat").await.unwrap().as_deref(), Some("colon"));
        assert_eq!(fs.get("ns_kat").await.unwrap().as_deref(), Some("underscore"));
        assert_eq!(fs.get("ns%3Akat").await.unwrap().as_deref(), Some("literal"));
    }

    #[tokio::test]
    async fn handles_wait_reports_failures() {
        struct Broken;
        #[async_trait]
        impl KvStore for Broken {
            async fn get(&self, _key: &str) -> Result<Option<String>, IngestError> {
                Ok(None)
            }
            async fn set(&self, key: &str, _value: String) -> Result<(), IngestError> {
                Err(IngestError::Cache(format!("{key} is read-only")))
            }
        }
        let gw = CacheGateway::new(Arc::new(Broken), "ns");
        let mut hs = PersistHandles::default();
        hs.push(gw.put_fetch_date("now"));
        assert_eq!(hs.len(), 1);
        assert!(matches!(hs.wait().await, Err(IngestError::Cache(_))));
    }
}
