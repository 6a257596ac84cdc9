//! Page fetching.
//!
//! [`PageFetcher`] is the seam between the crawler and the network.
//! [`HttpFetcher`] is the reqwest implementation; tests use
//! [`crate::testing::MockFetcher`].

mod http;
mod throttle;

pub use http::HttpFetcher;
pub use throttle::TokenBucket;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Errors from fetching a page.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connection { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },
}

impl FetchError {
    /// Timeouts, connection failures, 5xx and 429 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Connection { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || (500..600).contains(status),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::Timeout { url }
            | FetchError::Connection { url, .. }
            | FetchError::Status { url, .. } => url,
        }
    }
}

/// Retrieves a document by URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page body. Implementations apply their own retry policy;
    /// an error returned here is final.
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> FetchError {
        FetchError::Status {
            status,
            url: "https://example.com".into(),
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::Timeout {
            url: "u".into()
        }
        .is_retryable());
        assert!(FetchError::Connection {
            url: "u".into(),
            message: "refused".into()
        }
        .is_retryable());
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(403).is_retryable());
    }

    #[test]
    fn test_error_carries_url() {
        let err = status(502);
        assert_eq!(err.url(), "https://example.com");
        assert_eq!(err.to_string(), "HTTP 502 for https://example.com");
    }
}
