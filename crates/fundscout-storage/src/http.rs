//! Shared HTTP fetcher with per-host pacing, retry classification and
//! exponential backoff. Adapters declare their rate-limit policy; the fetcher
//! enforces it so one host's throttle never blocks another host's adapter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
// tokio's Instant, so pacing follows the runtime clock under test
use tokio::time::Instant;
use tracing::info_span;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub global_concurrency: usize,
    pub backoff: BackoffPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
            global_concurrency: 16,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Enforces a minimum interval between requests to one host.
#[derive(Debug)]
struct HostPacer {
    last_request: Mutex<Option<Instant>>,
}

impl HostPacer {
    fn new() -> Self {
        Self {
            last_request: Mutex::new(None),
        }
    }

    async fn wait_turn(&self, min_interval: Duration) {
        if min_interval.is_zero() {
            return;
        }
        loop {
            let now = Instant::now();
            let mut last = self.last_request.lock().await;
            match *last {
                Some(prev) if now.duration_since(prev) < min_interval => {
                    let sleep_for = min_interval - now.duration_since(prev);
                    drop(last);
                    tokio::time::sleep(sleep_for).await;
                }
                _ => {
                    *last = Some(now);
                    return;
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    global_limit: Arc<Semaphore>,
    pacers: Mutex<HashMap<String, Arc<HostPacer>>>,
    backoff: BackoffPolicy,
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed after retries: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("url has no host: {0}")]
    HostlessUrl(String),
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            global_limit: Arc::new(Semaphore::new(config.global_concurrency.max(1))),
            pacers: Mutex::new(HashMap::new()),
            backoff: config.backoff,
        })
    }

    async fn pacer_for_host(&self, host: &str) -> Arc<HostPacer> {
        let mut map = self.pacers.lock().await;
        map.entry(host.to_string())
            .or_insert_with(|| Arc::new(HostPacer::new()))
            .clone()
    }

    /// Fetch one URL, respecting the caller's per-host minimum interval and
    /// retrying transient failures with exponential backoff.
    pub async fn fetch_bytes(
        &self,
        run_id: Uuid,
        source_name: &str,
        url: &str,
        min_host_interval: Duration,
    ) -> Result<FetchedResponse, FetchError> {
        let host = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| FetchError::HostlessUrl(url.to_string()))?;

        let _global = self.global_limit.acquire().await.expect("semaphore not closed");
        let pacer = self.pacer_for_host(&host).await;
        pacer.wait_turn(min_host_interval).await;

        let span = info_span!("http_fetch", %run_id, source_name, url);
        let _guard = span.enter();

        let mut last_request_error: Option<reqwest::Error> = None;

        for attempt in 0..=self.backoff.max_retries {
            let resp_result = self.client.get(url).send().await;

            match resp_result {
                Ok(resp) => {
                    let status = resp.status();
                    let final_url = resp.url().to_string();

                    if status.is_success() {
                        let body = resp.bytes().await?.to_vec();
                        return Ok(FetchedResponse {
                            status,
                            final_url,
                            body,
                        });
                    }

                    let disposition = classify_status(status);
                    if disposition == RetryDisposition::Retryable && attempt < self.backoff.max_retries
                    {
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        continue;
                    }

                    return Err(FetchError::HttpStatus {
                        status: status.as_u16(),
                        url: final_url,
                    });
                }
                Err(err) => {
                    let disposition = classify_reqwest_error(&err);
                    if disposition == RetryDisposition::Retryable && attempt < self.backoff.max_retries
                    {
                        last_request_error = Some(err);
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return Err(FetchError::Request(err));
                }
            }
        }

        Err(FetchError::Request(
            last_request_error.expect("retry loop should capture a request error"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_logic_is_exponential_and_capped() {
        let policy = BackoffPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(350));
    }

    #[test]
    fn retry_classification_matches_status_classes() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            RetryDisposition::Retryable
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            RetryDisposition::Retryable
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            RetryDisposition::NonRetryable
        );
    }

    #[tokio::test(start_paused = true)]
    async fn host_pacer_spaces_out_requests() {
        let pacer = HostPacer::new();
        let interval = Duration::from_millis(500);

        let start = Instant::now();
        pacer.wait_turn(interval).await;
        pacer.wait_turn(interval).await;
        // with a paused clock the second turn still has to advance time
        assert!(start.elapsed() >= interval);
    }
}
