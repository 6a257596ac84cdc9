//! reqwest-backed page fetcher.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::throttle::TokenBucket;
use super::{FetchError, PageFetcher};
use crate::config::HttpConfig;
use crate::metrics;
use crate::retry::RetryPolicy;

/// Fetches pages over HTTP with retries and optional pacing.
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
    throttle: Option<TokenBucket>,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");

        let throttle = match config.requests_per_minute {
            0 => None,
            rpm => Some(TokenBucket::new(rpm)),
        };

        Self {
            client,
            retry: RetryPolicy::new(&config.retry),
            throttle,
        }
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_once(&self, url: &Url) -> Result<String, FetchError> {
        if let Some(throttle) = &self.throttle {
            throttle.acquire().await;
        }

        debug!(url = %url, "Fetching page");
        metrics::HTTP_REQUESTS.inc();

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // Text is decoded lossily, so any error here is a failed read.
        response.text().await.map_err(|e| classify(e, url))
    }
}

fn classify(e: reqwest::Error, url: &Url) -> FetchError {
    let url = url.to_string();
    if e.is_timeout() {
        return FetchError::Timeout { url };
    }

    let mut message = e.to_string();
    let mut source = std::error::Error::source(&e);
    while let Some(cause) = source {
        message = format!("{}: {}", message, cause);
        source = std::error::Error::source(cause);
    }
    FetchError::Connection { url, message }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let result = self.retry.retry(url.as_str(), || self.fetch_once(url)).await;
        if result.is_err() {
            metrics::HTTP_FAILURES.inc();
        }
        result
    }
}
