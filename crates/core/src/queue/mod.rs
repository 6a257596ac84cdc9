//! Bounded, deduplicating fetch queue.
//!
//! URLs are submitted up front, then [`FetchQueue::run`] drains them through a
//! fixed pool of workers. Each worker fetches a page with the shared
//! [`PageFetcher`](crate::fetch::PageFetcher) and hands the body to a
//! [`PageHandler`].

mod fetch_queue;
mod types;

pub use fetch_queue::FetchQueue;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::crawler::CrawlError;

/// Errors from submitting work to the queue.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// The backlog is at capacity. The URL was not recorded as seen.
    #[error("Queue full ({capacity} pending), rejected {url}")]
    Full { capacity: usize, url: String },

    #[error("Queue closed, rejected {url}")]
    Closed { url: String },
}

/// Processes one fetched page.
#[async_trait]
pub trait PageHandler: Send + Sync {
    async fn handle(&self, url: &Url, body: String) -> Result<(), CrawlError>;
}
