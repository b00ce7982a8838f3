// src/ingest/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("request to {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed upstream payload: {0}")]
    Parse(String),

    /// A schedule page row has a game column with no matching header cell.
    #[error("no field header for column {column} in date group {date}")]
    FieldNotFound { date: String, column: usize },

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("cache store: {0}")]
    Cache(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IngestError {
    /// Transport or HTTP status failure.
    pub fn is_fetch(&self) -> bool {
        matches!(self, IngestError::Fetch { .. } | IngestError::Status { .. })
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Fetch { .. } => true,
            IngestError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<csv::Error> for IngestError {
    fn from(e: csv::Error) -> Self {
        IngestError::Parse(format!("csv: {e}"))
    }
}
