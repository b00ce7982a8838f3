// src/config/mod.rs
pub mod pipeline;
pub mod sources;

use std::sync::Arc;

use anyhow::Result;

use crate::ingest::cache::{CacheGateway, FileStore, KvStore, MemoryStore};
use crate::ingest::registry::SourceRegistry;
use crate::ingest::transport::HttpTransport;
use crate::ingest::Aggregator;
use pipeline::{CacheBackend, PipelineConfig};

/// Everything the service needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub registry: Arc<SourceRegistry>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let pipeline = PipelineConfig::from_env();
        let registry = Arc::new(sources::load_sources_default()?);
        tracing::info!(
            sources = registry.len(),
            namespace = %pipeline.namespace,
            timeout_secs = pipeline.request_timeout.as_secs(),
            max_attempts = pipeline.max_attempts,
            "schedule config loaded"
        );
        Ok(Self { pipeline, registry })
    }

    pub fn store(&self) -> Arc<dyn KvStore> {
        match &self.pipeline.cache {
            CacheBackend::File(dir) => Arc::new(FileStore::new(dir.clone())),
            CacheBackend::Memory => Arc::new(MemoryStore::new()),
        }
    }

    /// Aggregator wired to real HTTP and the configured cache store.
    pub fn build_aggregator(&self) -> Aggregator {
        let transport = HttpTransport::new()
            .with_timeout(self.pipeline.request_timeout)
            .with_max_attempts(self.pipeline.max_attempts);
        let cache = CacheGateway::new(self.store(), self.pipeline.namespace.clone());
        Aggregator::new(Arc::clone(&self.registry), Arc::new(transport), cache)
    }
}
