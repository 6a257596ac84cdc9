//! Crawl phases.
//!
//! [`CatalogCrawler`] walks the paginated album index and writes album stubs.
//! [`DetailExtractor`] handles fetched album pages from the
//! [`FetchQueue`](crate::queue::FetchQueue) and adds tracks and metadata.

mod catalog;
mod detail;

pub use catalog::{CatalogCrawler, CrawlReport, FailedUpsert};
pub use detail::DetailExtractor;

use thiserror::Error;

use crate::catalog::StoreError;
use crate::fetch::FetchError;

/// Errors from the crawl phases.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// An index page could not be fetched; the catalog crawl stopped there.
    #[error("Failed to fetch index page {url} after {pages_visited} pages: {source}")]
    PageFetch {
        url: String,
        pages_visited: usize,
        #[source]
        source: FetchError,
    },

    /// A detail page was fetched for an album the store does not know.
    #[error("Album not found in store: {0}")]
    AlbumNotFound(String),

    #[error("URL is not an album page: {0}")]
    UnrecognizedAlbumUrl(String),

    #[error("Store error for album {album_id}: {source}")]
    Store {
        album_id: String,
        #[source]
        source: StoreError,
    },
}
