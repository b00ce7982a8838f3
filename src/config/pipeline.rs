// src/config/pipeline.rs
use std::path::PathBuf;
use std::time::Duration;

use crate::ingest::cache::DEFAULT_NAMESPACE;
use crate::ingest::staleness::StalenessPolicy;
use crate::ingest::transport::MAX_ATTEMPTS;

pub const ENV_NAMESPACE: &str = "SCHEDULE_CACHE_NAMESPACE";
pub const ENV_TIMEOUT_SECS: &str = "SCHEDULE_REQUEST_TIMEOUT_SECS";
pub const ENV_MAX_ATTEMPTS: &str = "SCHEDULE_MAX_RETRIES";
pub const ENV_STALE_HOURS: &str = "SCHEDULE_STALE_AFTER_HOURS";
pub const ENV_CACHE_DIR: &str = "SCHEDULE_CACHE_DIR";
pub const ENV_CACHE_BACKEND: &str = "SCHEDULE_CACHE_BACKEND";
pub const ENV_REFRESH_EVERY_MINS: &str = "SCHEDULE_REFRESH_EVERY_MINS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    File(PathBuf),
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub namespace: String,
    pub request_timeout: Duration,
    /// Total attempts per upstream request (1 = no retry).
    pub max_attempts: u8,
    pub staleness: StalenessPolicy,
    pub cache: CacheBackend,
    /// Background staleness check interval; `None` leaves refresh to callers.
    pub refresh_every: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            request_timeout: Duration::from_secs(15),
            max_attempts: 1,
            staleness: StalenessPolicy::default(),
            cache: CacheBackend::File(PathBuf::from("cache")),
            refresh_every: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl PipelineConfig {
    /// Defaults overridden by whichever `SCHEDULE_*` env vars are set.
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let d = Self::default();

        let namespace = std::env::var(ENV_NAMESPACE)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(d.namespace);

        let request_timeout = env_parse::<u64>(ENV_TIMEOUT_SECS)
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(d.request_timeout);

        let max_attempts = env_parse::<u8>(ENV_MAX_ATTEMPTS)
            .map(|n| n.clamp(1, MAX_ATTEMPTS))
            .unwrap_or(d.max_attempts);

        let staleness = env_parse::<i64>(ENV_STALE_HOURS)
            .filter(|h| *h >= 0)
            .map(StalenessPolicy::hours)
            .unwrap_or(d.staleness);

        let dir = std::env::var(ENV_CACHE_DIR)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("cache"));
        let cache = match std::env::var(ENV_CACHE_BACKEND)
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" | "mem" => CacheBackend::Memory,
            _ => CacheBackend::File(dir),
        };

        let refresh_every = env_parse::<u64>(ENV_REFRESH_EVERY_MINS)
            .filter(|m| *m > 0)
            .map(|m| Duration::from_secs(m * 60));

        Self {
            namespace,
            request_timeout,
            max_attempts,
            staleness,
            cache,
            refresh_every,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn clear() {
        for k in [
            ENV_NAMESPACE,
            ENV_TIMEOUT_SECS,
            ENV_MAX_ATTEMPTS,
            ENV_STALE_HOURS,
            ENV_CACHE_DIR,
            ENV_CACHE_BACKEND,
            ENV_REFRESH_EVERY_MINS,
        ] {
            env::remove_var(k);
        }
    }

    #[serial_test::serial]
    #[test]
    fn defaults_without_env() {
        clear();
        assert_eq!(PipelineConfig::from_env(), PipelineConfig::default());
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_and_bad_values() {
        clear();
        env::set_var(ENV_NAMESPACE, "test-ns");
        env::set_var(ENV_TIMEOUT_SECS, "3");
        env::set_var(ENV_MAX_ATTEMPTS, "9");
        env::set_var(ENV_STALE_HOURS, "nope");
        env::set_var(ENV_CACHE_BACKEND, "memory");
        env::set_var(ENV_REFRESH_EVERY_MINS, "30");

        let c = PipelineConfig::from_env();
        assert_eq!(c.namespace, "test-ns");
        assert_eq!(c.request_timeout, Duration::from_secs(3));
        assert_eq!(c.max_attempts, 5);
        assert_eq!(c.staleness, StalenessPolicy::hours(12));
        assert_eq!(c.cache, CacheBackend::Memory);
        assert_eq!(c.refresh_every, Some(Duration::from_secs(1800)));
        clear();
    }
}
