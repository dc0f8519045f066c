use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState,
    state::NotKeyed,
};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::config::{EdgarConfig, EdgarUrls};
use super::error::{IngestError, Result};

/// At most 3 attempts total (the initial try plus 2 retries), per the fetcher contract.
const MAX_RETRIES: u32 = 2;
const INITIAL_BACKOFF_MS: u64 = 1000;
const BACKOFF_FACTOR: u64 = 2;
const JITTER_FRACTION: f64 = 0.25;

type Governor = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Rate-limited HTTP client for SEC EDGAR.
///
/// `Edgar` enforces a single global token bucket shared across every caller (no
/// per-worker buckets — that would let aggregate throughput exceed the fair-access
/// ceiling) and retries 429/5xx responses with exponential backoff and jitter.
#[derive(Debug, Clone)]
pub struct Edgar {
    pub(crate) client: reqwest::Client,
    pub(crate) rate_limiter: Arc<Governor>,
    pub(crate) edgar_archives_url: String,
    pub(crate) edgar_data_url: String,
    pub(crate) edgar_files_url: String,
    pub(crate) edgar_search_url: String,
}

impl Edgar {
    /// Creates a new client. `user_agent` must be of the form `"<organization>
    /// <contact-email>"` — a missing `@` is rejected with `ConfigError` before any
    /// network I/O is attempted, per the fetcher's contract.
    pub fn new(user_agent: &str) -> Result<Self> {
        let config = EdgarConfig {
            user_agent: user_agent.to_string(),
            rate_limit: 10,
            timeout: Duration::from_secs(30),
            base_urls: EdgarUrls::default(),
        };
        Self::with_config(config)
    }

    pub fn with_config(config: EdgarConfig) -> Result<Self> {
        if !config.user_agent.contains('@') {
            return Err(IngestError::ConfigError(format!(
                "user agent '{}' does not carry a contact email",
                config.user_agent
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| IngestError::ConfigError(format!("invalid user agent: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| IngestError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(config.rate_limit)
                .ok_or_else(|| IngestError::ConfigError("rate limit must be nonzero".into()))?,
        )));

        Ok(Edgar {
            client,
            rate_limiter,
            edgar_archives_url: config.base_urls.archives,
            edgar_data_url: config.base_urls.data,
            edgar_files_url: config.base_urls.files,
            edgar_search_url: config.base_urls.search,
        })
    }

    /// `(2^retry × 1000ms) ± 25%`, per the fetcher's backoff contract.
    fn calculate_backoff(retry: u32) -> Duration {
        let backoff_ms = INITIAL_BACKOFF_MS * (BACKOFF_FACTOR.pow(retry));
        let jitter = (backoff_ms as f64 * JITTER_FRACTION * (fastrand::f64() - 0.5)) as i64;
        Duration::from_millis((backoff_ms as i64 + jitter).max(0) as u64)
    }

    /// Fetches binary data from `url`, honoring the shared rate limit and retrying
    /// 429/5xx responses. Returns early if `cancel` is already triggered at a
    /// suspension point.
    pub async fn get_bytes(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let mut retries = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(IngestError::FetchError("cancelled".into())),
                _ = self.rate_limiter.until_ready() => {}
            }

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(IngestError::RequestError)?;

            match response.status() {
                reqwest::StatusCode::OK => {
                    return response
                        .bytes()
                        .await
                        .map(|b| b.to_vec())
                        .map_err(IngestError::RequestError);
                }
                reqwest::StatusCode::NOT_FOUND => return Err(IngestError::NotFound),
                reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    if retries >= MAX_RETRIES {
                        return Err(IngestError::RateLimited);
                    }
                    let retry_after = Self::calculate_backoff(retries);
                    sleep(retry_after).await;
                    retries += 1;
                    continue;
                }
                status if status.is_server_error() => {
                    if retries >= MAX_RETRIES {
                        return Err(IngestError::FetchError(format!(
                            "server error {status} for {url}"
                        )));
                    }
                    let retry_after = Self::calculate_backoff(retries);
                    tracing::warn!(%url, %status, attempt = retries + 1, "server error, retrying");
                    sleep(retry_after).await;
                    retries += 1;
                    continue;
                }
                status => {
                    return Err(IngestError::FetchError(format!(
                        "unexpected status {status} for {url}"
                    )));
                }
            }
        }
    }

    /// Fetches text content from `url` with the same retry/backoff behavior as
    /// [`Edgar::get_bytes`].
    pub async fn get(&self, url: &str, cancel: &CancellationToken) -> Result<String> {
        let mut retries = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(IngestError::FetchError("cancelled".into())),
                _ = self.rate_limiter.until_ready() => {}
            }

            let response_result = self.client.get(url).send().await;

            match response_result {
                Ok(response) => {
                    let status = response.status();
                    let headers = response.headers().clone();

                    match status {
                        reqwest::StatusCode::OK => {
                            return response.text().await.map_err(IngestError::RequestError);
                        }
                        reqwest::StatusCode::NOT_FOUND => return Err(IngestError::NotFound),
                        reqwest::StatusCode::TOO_MANY_REQUESTS => {
                            if retries >= MAX_RETRIES {
                                return Err(IngestError::RateLimited);
                            }

                            let retry_after_duration = headers
                                .get("retry-after")
                                .and_then(|h| h.to_str().ok())
                                .and_then(|s| s.parse::<u64>().ok())
                                .map(Duration::from_secs)
                                .map(|d| d.max(Self::calculate_backoff(retries)))
                                .unwrap_or_else(|| Self::calculate_backoff(retries));

                            tracing::warn!(
                                %url,
                                attempt = retries + 1,
                                max_attempts = MAX_RETRIES + 1,
                                wait = ?retry_after_duration,
                                "rate limited, backing off"
                            );
                            sleep(retry_after_duration).await;
                            retries += 1;
                            continue;
                        }
                        status if status.is_server_error() => {
                            if retries >= MAX_RETRIES {
                                return Err(IngestError::FetchError(format!(
                                    "server error {status} for {url}"
                                )));
                            }
                            let backoff_duration = Self::calculate_backoff(retries);
                            tracing::warn!(%url, %status, attempt = retries + 1, "server error, retrying");
                            sleep(backoff_duration).await;
                            retries += 1;
                            continue;
                        }
                        other_status => {
                            let error_body = response
                                .text()
                                .await
                                .unwrap_or_else(|_| "failed to read error body".to_string());
                            return Err(IngestError::FetchError(format!(
                                "status {other_status} for {url}: {}",
                                error_body.chars().take(200).collect::<String>()
                            )));
                        }
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        if retries >= MAX_RETRIES {
                            return Err(IngestError::FetchError(format!("timeout for {url}")));
                        }
                        let backoff_duration = Self::calculate_backoff(retries);
                        tracing::warn!(%url, attempt = retries + 1, "timeout, retrying");
                        sleep(backoff_duration).await;
                        retries += 1;
                        continue;
                    }
                    if retries >= MAX_RETRIES {
                        return Err(IngestError::RequestError(e));
                    }
                    let backoff_duration = Self::calculate_backoff(retries);
                    tracing::warn!(%url, error = %e, attempt = retries + 1, "request failed, retrying");
                    sleep(backoff_duration).await;
                    retries += 1;
                    continue;
                }
            }
        }
    }

    pub fn archives_url(&self) -> &str {
        &self.edgar_archives_url
    }

    pub fn data_url(&self) -> &str {
        &self.edgar_data_url
    }

    pub fn files_url(&self) -> &str {
        &self.edgar_files_url
    }

    pub fn search_url(&self) -> &str {
        &self.edgar_search_url
    }
}
