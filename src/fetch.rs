//! HTTP fetch collaborator with retry and backoff.
//!
//! Every network read in the pipeline goes through the [`Fetcher`] trait so
//! the locate/expand/match stages can be exercised in tests against canned
//! responses. The production implementation is [`HttpFetcher`], a thin
//! wrapper over a pooled `reqwest::Client`.
//!
//! Retry strategy:
//! - HTTP 429 and 5xx → retry with exponential backoff (1s, 2s, 4s, ...)
//! - HTTP 404/410 → [`FetchError::NotFound`], never retried
//! - other 4xx → fail immediately
//! - network errors and timeouts → retry

use async_trait::async_trait;
use std::time::Duration;

use crate::config::HttpConfig;

/// Fetch failure, typed so callers can branch on the kind.
///
/// Probing treats `NotFound` as "try the next candidate"; everything else
/// is a soft per-URL failure that the caller counts and skips.
#[derive(Debug, Clone)]
pub enum FetchError {
    /// Confirmed absence (404/410). Retrying is pointless.
    NotFound,
    /// Non-success status that is not retryable or exhausted its retries.
    Status(u16),
    /// Connection, DNS, or timeout failure after all retries.
    Network(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::NotFound => write!(f, "not found"),
            FetchError::Status(code) => write!(f, "HTTP status {}", code),
            FetchError::Network(e) => write!(f, "network error: {}", e),
        }
    }
}

impl std::error::Error for FetchError {}

/// Abstraction over HTTP GET used by every pipeline stage.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a URL and decode the response body as text.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;

    /// Fetch a URL as raw bytes (PDF renditions).
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Production fetcher: shared connection pool, browser-like identity,
/// bounded retries with exponential backoff.
///
/// Safe for concurrent use; clone the `Arc` it is handed around in rather
/// than building one client per worker.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }

    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let mut last_err = FetchError::Network("no attempt made".to_string());

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    let code = status.as_u16();
                    if code == 404 || code == 410 {
                        return Err(FetchError::NotFound);
                    }
                    if is_transient(code) {
                        tracing::debug!(url, code, attempt, "transient status, will retry");
                        last_err = FetchError::Status(code);
                        continue;
                    }
                    return Err(FetchError::Status(code));
                }
                Err(e) => {
                    tracing::debug!(url, attempt, error = %e, "request failed, will retry");
                    last_err = FetchError::Network(e.to_string());
                    continue;
                }
            }
        }

        Err(last_err)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.get_with_retry(url).await?;
        resp.text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self.get_with_retry(url).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Statuses worth retrying: rate limiting and server-side failures.
fn is_transient(code: u16) -> bool {
    matches!(code, 429 | 500 | 502 | 503 | 504)
}
