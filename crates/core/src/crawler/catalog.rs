use std::collections::HashSet;
use std::sync::Arc;

use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use url::Url;

use super::CrawlError;
use crate::catalog::RecordStore;
use crate::extract::{parse_index_page, IndexPage, SiteLayout};
use crate::fetch::PageFetcher;
use crate::metrics;
use crate::retry::RetryPolicy;

/// An album row whose upsert failed after retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUpsert {
    pub album_id: String,
    pub url: String,
    pub error: String,
}

/// Summary of a completed catalog crawl.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlReport {
    pub pages_visited: usize,
    /// Successful album upserts, one per usable row.
    pub albums_upserted: usize,
    /// Upserts that created a new album.
    pub albums_created: usize,
    pub rows_skipped: usize,
    pub failed_upserts: Vec<FailedUpsert>,
    /// The last next-page link pointed at a page already visited.
    pub stopped_on_cycle: bool,
}

/// Walks the paginated album index.
pub struct CatalogCrawler {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn RecordStore>,
    site: SiteLayout,
    store_retry: RetryPolicy,
}

impl CatalogCrawler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn RecordStore>,
        site: SiteLayout,
        store_retry: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            store,
            site,
            store_retry,
        }
    }

    /// Visit `start` and every page reachable through next-page links.
    ///
    /// Each index row is upserted as soon as its page is parsed, so albums
    /// from pages before a fetch failure stay persisted.
    pub async fn crawl(&self, start: &Url) -> Result<CrawlReport, CrawlError> {
        let mut report = CrawlReport::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut next = Some(start.clone());

        while let Some(page_url) = next.take() {
            if !visited.insert(page_url.to_string()) {
                warn!(url = %page_url, "Next page was already visited, stopping");
                report.stopped_on_cycle = true;
                break;
            }

            let body = self.fetcher.fetch(&page_url).await.map_err(|source| {
                error!(url = %page_url, pages_visited = report.pages_visited, error = %source, "Index page fetch failed");
                CrawlError::PageFetch {
                    url: page_url.to_string(),
                    pages_visited: report.pages_visited,
                    source,
                }
            })?;

            let page = {
                let doc = Html::parse_document(&body);
                parse_index_page(&doc, &page_url, &self.site)
            };

            report.pages_visited += 1;
            metrics::INDEX_PAGES.inc();
            info!(
                page = report.pages_visited,
                url = %page_url,
                albums = page.albums.len(),
                "Processing index page"
            );

            next = self.process_page(page, &page_url, &mut report).await;
        }

        info!(
            pages = report.pages_visited,
            albums = report.albums_upserted,
            created = report.albums_created,
            skipped = report.rows_skipped,
            failed = report.failed_upserts.len(),
            "Catalog crawl finished"
        );
        Ok(report)
    }

    /// Upsert a page's rows and return its next-page link.
    async fn process_page(
        &self,
        page: IndexPage,
        page_url: &Url,
        report: &mut CrawlReport,
    ) -> Option<Url> {
        for skipped in &page.skipped_rows {
            warn!(url = %page_url, row = skipped.row, reason = %skipped.reason, "Skipping index row");
            metrics::ROWS_SKIPPED.inc();
        }
        report.rows_skipped += page.skipped_rows.len();

        for album in &page.albums {
            let result = self
                .store_retry
                .retry("upsert_album", || async { self.store.upsert_album(album) })
                .await;
            match result {
                Ok(outcome) => {
                    debug!(album_id = %album.id, created = outcome.created, "Album upserted");
                    metrics::ALBUM_UPSERTS
                        .with_label_values(&["catalog", "ok"])
                        .inc();
                    report.albums_upserted += 1;
                    if outcome.created {
                        report.albums_created += 1;
                    }
                }
                Err(e) => {
                    error!(album_id = %album.id, url = %album.url, error = %e, "Album upsert failed");
                    metrics::ALBUM_UPSERTS
                        .with_label_values(&["catalog", "failed"])
                        .inc();
                    report.failed_upserts.push(FailedUpsert {
                        album_id: album.id.clone(),
                        url: album.url.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        page.next_page
    }
}
