// src/ingest/transport.rs
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};

use crate::ingest::error::IngestError;

/// Text-returning HTTP calls the fetch strategies need.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` as `application/x-www-form-urlencoded`, return the response text.
    async fn post_form(&self, url: &str, body: &str) -> Result<String, IngestError>;

    /// GET `url`, return the response text.
    async fn get(&self, url: &str) -> Result<String, IngestError>;
}

/// Upper bound on attempts per request.
pub const MAX_ATTEMPTS: u8 = 5;

/// Delay before retrying after failed attempt `attempt` (1-based): 500ms, 1s, 2s, ...
fn backoff(attempt: u8) -> Duration {
    let shift = u32::from(attempt.saturating_sub(1)).min(6);
    Duration::from_millis(500u64 << shift)
}

/// reqwest-backed transport with a per-request timeout and bounded retries.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
    max_attempts: u8,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: Duration::from_secs(15),
            max_attempts: 1,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts per request, including the first. Clamped to `1..=MAX_ATTEMPTS`.
    pub fn with_max_attempts(mut self, attempts: u8) -> Self {
        self.max_attempts = attempts.clamp(1, MAX_ATTEMPTS);
        self
    }

    async fn send_once(&self, req: reqwest::RequestBuilder, url: &str) -> Result<String, IngestError> {
        let resp = req
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| IngestError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IngestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text().await.map_err(|e| IngestError::Fetch {
            url: url.to_string(),
            reason: format!("reading body: {e}"),
        })
    }

    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<String, IngestError>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.send_once(build(), url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::debug!(target: "ingest", %url, attempt, error = %e, "retrying upstream request");
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_form(&self, url: &str, body: &str) -> Result<String, IngestError> {
        self.send_with_retry(url, || {
            self.client
                .post(url)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body.to_string())
        })
        .await
    }

    async fn get(&self, url: &str) -> Result<String, IngestError> {
        self.send_with_retry(url, || self.client.get(url)).await
    }
}

// --- Test helper ---

#[derive(Debug, Clone)]
enum Reply {
    Body(String),
    Status(u16),
    Unreachable,
}

/// Serves canned responses keyed by method, url and (for POST) body.
/// Unregistered requests fail as unreachable.
#[derive(Default)]
pub struct FixtureTransport {
    replies: HashMap<String, Reply>,
    pub calls: Mutex<Vec<String>>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(method: &str, url: &str, body: Option<&str>) -> String {
        match body {
            Some(b) => format!("{method} {url} {b}"),
            None => format!("{method} {url}"),
        }
    }

    pub fn with_post(mut self, url: &str, body: &str, response: &str) -> Self {
        self.replies
            .insert(Self::key("POST", url, Some(body)), Reply::Body(response.to_string()));
        self
    }

    pub fn with_get(mut self, url: &str, response: &str) -> Self {
        self.replies
            .insert(Self::key("GET", url, None), Reply::Body(response.to_string()));
        self
    }

    pub fn with_post_status(mut self, url: &str, body: &str, status: u16) -> Self {
        self.replies
            .insert(Self::key("POST", url, Some(body)), Reply::Status(status));
        self
    }

    pub fn with_get_status(mut self, url: &str, status: u16) -> Self {
        self.replies.insert(Self::key("GET", url, None), Reply::Status(status));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    fn answer(&self, key: String, url: &str) -> Result<String, IngestError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(key.clone());
        }
        match self.replies.get(&key).cloned().unwrap_or(Reply::Unreachable) {
            Reply::Body(b) => Ok(b),
            Reply::Status(status) => Err(IngestError::Status {
                url: url.to_string(),
                status,
            }),
            Reply::Unreachable => Err(IngestError::Fetch {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    async fn post_form(&self, url: &str, body: &str) -> Result<String, IngestError> {
        self.answer(Self::key("POST", url, Some(body)), url)
    }

    async fn get(&self, url: &str) -> Result<String, IngestError> {
        self.answer(Self::key("GET", url, None), url)
    }
}
