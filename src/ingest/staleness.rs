// src/ingest/staleness.rs
use chrono::{DateTime, Duration, Utc};

/// Decides whether the cached schedule is old enough to refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    max_age: Duration,
}

impl StalenessPolicy {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    pub fn hours(h: i64) -> Self {
        Self::new(Duration::hours(h))
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Missing or unparseable timestamps count as stale. A timestamp in the
    /// future (clock skew) counts as fresh.
    pub fn is_stale(&self, fetch_date: Option<&str>, now: DateTime<Utc>) -> bool {
        let Some(last) = fetch_date.and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok()) else {
            return true;
        };
        now.signed_duration_since(last.with_timezone(&Utc)) > self.max_age
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::hours(12)
    }
}
