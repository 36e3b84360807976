//! Page fetching with bounded exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use retake_core::{Error, RetakeConfig, Result};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

static NEXT_DATA: Lazy<Selector> = Lazy::new(|| Selector::parse("script#__NEXT_DATA__").unwrap());

/// Source of raw HTML pages, addressed by path (`/events/123`, `/series/9`).
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<String>;
}

/// Fetch a page, giving up with `Cancelled` as soon as the token fires.
pub async fn fetch_cancellable(
    fetcher: &dyn PageFetcher,
    path: &str,
    cancel: &CancellationToken,
) -> Result<String> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        page = fetcher.fetch(path) => page,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): base doubled each time, capped.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

enum Attempt {
    Retry(String),
    Fatal(Error),
}

/// `PageFetcher` over HTTP. Request errors, 5xx and 429 are retried.
pub struct HttpFetcher {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(base_url: &str, timeout: Duration, policy: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        })
    }

    pub fn from_config(config: &RetakeConfig) -> Result<Self> {
        Self::new(
            &config.source_base_url,
            config.fetch_timeout,
            RetryPolicy {
                attempts: config.fetch_attempts,
                base_delay: config.fetch_backoff,
                max_delay: config.fetch_max_backoff,
            },
        )
    }

    async fn attempt(&self, url: &str) -> std::result::Result<String, Attempt> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Attempt::Retry(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .text()
                .await
                .map_err(|e| Attempt::Retry(e.to_string()));
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(Attempt::Retry(format!("HTTP {}", status)))
        } else {
            Err(Attempt::Fatal(Error::UpstreamUnavailable(format!(
                "HTTP {}: {}",
                status, url
            ))))
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let attempts = self.policy.attempts.max(1);
        let mut last = String::new();

        for attempt in 0..attempts {
            debug!("Fetching {} (attempt {}/{})", url, attempt + 1, attempts);
            match self.attempt(&url).await {
                Ok(body) => return Ok(body),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(reason)) => {
                    warn!("Fetch of {} failed: {}", url, reason);
                    last = reason;
                }
            }
            if attempt + 1 < attempts {
                tokio::time::sleep(self.policy.delay(attempt)).await;
            }
        }

        Err(Error::UpstreamUnavailable(format!(
            "{} unreachable after {} attempts: {}",
            url, attempts, last
        )))
    }
}

/// Parse the `__NEXT_DATA__` JSON payload embedded in a page.
pub fn extract_next_data(html: &str) -> Result<serde_json::Value> {
    let document = Html::parse_document(html);
    let script = document
        .select(&NEXT_DATA)
        .next()
        .ok_or_else(|| Error::Extraction("page has no __NEXT_DATA__ payload".into()))?;
    let raw: String = script.text().collect();
    serde_json::from_str(raw.trim())
        .map_err(|e| Error::Extraction(format!("invalid __NEXT_DATA__ JSON: {}", e)))
}
