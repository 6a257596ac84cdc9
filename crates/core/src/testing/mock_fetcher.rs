//! Mock page fetcher for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

use crate::fetch::{FetchError, PageFetcher};

/// Mock implementation of the PageFetcher trait.
///
/// Serves registered pages from memory:
/// - Unknown URLs fail with HTTP 404
/// - Queued errors are returned before the page, one per request
/// - Every request is recorded for assertions
///
/// # Example
///
/// ```rust,ignore
/// use ostcat_core::testing::{MockFetcher, fixtures};
///
/// let fetcher = MockFetcher::new();
/// fetcher.set_page(fixtures::FIRST_PAGE, &fixtures::index_page(&[], None));
/// fetcher.fail_next(fixtures::FIRST_PAGE, FetchError::Timeout { url: "..".into() });
///
/// // First fetch times out, second returns the page
/// assert_eq!(fetcher.request_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MockFetcher {
    pages: Mutex<HashMap<String, String>>,
    errors: Mutex<HashMap<String, VecDeque<FetchError>>>,
    requests: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn set_page(&self, url: &str, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }

    /// Fail the next request for `url` with `error`. Calls stack up.
    pub fn fail_next(&self, url: &str, error: FetchError) {
        self.errors
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(error);
    }

    /// Sleep before answering each request.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of requests made for one URL.
    pub fn requests_for(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let key = url.to_string();
        self.requests.lock().unwrap().push(key.clone());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self
            .errors
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front())
        {
            return Err(error);
        }

        self.pages
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or(FetchError::Status {
                status: 404,
                url: key,
            })
    }
}
