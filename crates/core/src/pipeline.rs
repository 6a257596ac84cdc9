//! Crawl orchestration: catalog phase, then detail phase.

use std::mem;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use url::Url;

use crate::catalog::{RecordStore, StoreError};
use crate::config::{Config, ConfigError, QueueConfig};
use crate::crawler::{CatalogCrawler, CrawlError, CrawlReport, DetailExtractor};
use crate::extract::SiteLayout;
use crate::fetch::PageFetcher;
use crate::metrics;
use crate::queue::{FetchQueue, PageHandler, QueueError, QueueReport, Submission};
use crate::retry::RetryPolicy;

/// Summary of the detail phase.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetailReport {
    /// Album URLs listed by the store.
    pub albums: usize,
    pub submitted: usize,
    pub duplicates: usize,
    /// Stored URLs that no longer parse.
    pub invalid_urls: usize,
    /// Times the queue filled up and was drained early.
    pub overflows: usize,
    /// Queue runs, the final one included.
    pub batches: usize,
    pub queue: QueueReport,
}

/// Outcome of a full pipeline run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Set when the catalog crawl finished.
    pub catalog: Option<CrawlReport>,
    /// Set when the catalog crawl halted.
    pub catalog_error: Option<CrawlError>,
    pub details: Option<DetailReport>,
    /// Set when the detail phase could not start.
    pub details_error: Option<StoreError>,
}

impl PipelineReport {
    /// Both phases ran to completion. Per-album failures do not count.
    pub fn is_complete(&self) -> bool {
        self.catalog_error.is_none() && self.details_error.is_none()
    }
}

/// Runs the catalog crawl, then fetches every stored album page.
pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn RecordStore>,
    site: SiteLayout,
    start: Url,
    queue: QueueConfig,
    store_retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn RecordStore>,
        site: SiteLayout,
        start: Url,
        queue: QueueConfig,
        store_retry: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            store,
            site,
            start,
            queue,
            store_retry,
        }
    }

    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            fetcher,
            store,
            SiteLayout::from_config(&config.site)?,
            config.site.start()?,
            config.queue.clone(),
            RetryPolicy::new(&config.store.retry),
        ))
    }

    /// Run both phases.
    ///
    /// A halted catalog crawl is recorded and the detail phase still runs
    /// over whatever the store holds.
    pub async fn run(&self) -> PipelineReport {
        let mut report = PipelineReport::default();

        match self.run_catalog().await {
            Ok(catalog) => report.catalog = Some(catalog),
            Err(e) => {
                error!(error = %e, "Catalog phase halted");
                report.catalog_error = Some(e);
            }
        }

        match self.run_details().await {
            Ok(details) => report.details = Some(details),
            Err(e) => {
                error!(error = %e, "Detail phase could not start");
                report.details_error = Some(e);
            }
        }

        report
    }

    pub async fn run_catalog(&self) -> Result<CrawlReport, CrawlError> {
        info!(start = %self.start, "Starting catalog phase");
        CatalogCrawler::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.store),
            self.site.clone(),
            self.store_retry.clone(),
        )
        .crawl(&self.start)
        .await
    }

    /// Submit every stored album URL to the fetch queue and drain it.
    ///
    /// A full queue is drained before submission continues on a fresh one.
    pub async fn run_details(&self) -> Result<DetailReport, StoreError> {
        let urls = self
            .store_retry
            .retry("album_urls", || async { self.store.album_urls() })
            .await?;
        info!(albums = urls.len(), "Starting detail phase");

        let handler: Arc<dyn PageHandler> = Arc::new(DetailExtractor::new(
            Arc::clone(&self.store),
            self.site.clone(),
            self.store_retry.clone(),
        ));

        let mut report = DetailReport {
            albums: urls.len(),
            ..DetailReport::default()
        };
        let mut queue = FetchQueue::new(&self.queue);

        for raw in urls {
            let url = match Url::parse(&raw) {
                Ok(url) => url,
                Err(e) => {
                    warn!(url = %raw, error = %e, "Skipping stored album with invalid URL");
                    report.invalid_urls += 1;
                    continue;
                }
            };

            loop {
                match queue.submit(url.clone()) {
                    Ok(Submission::Queued) => report.submitted += 1,
                    Ok(Submission::Duplicate) => report.duplicates += 1,
                    Err(QueueError::Full { capacity, .. }) => {
                        warn!(
                            capacity = capacity,
                            url = %url,
                            "Fetch queue full, draining batch before continuing"
                        );
                        metrics::QUEUE_OVERFLOWS.inc();
                        report.overflows += 1;
                        let full = mem::replace(&mut queue, FetchQueue::new(&self.queue));
                        self.drain(full, &mut report, &handler).await;
                        continue;
                    }
                    Err(e @ QueueError::Closed { .. }) => {
                        error!(error = %e, "Fetch queue closed unexpectedly");
                    }
                }
                break;
            }
        }

        self.drain(queue, &mut report, &handler).await;

        info!(
            completed = report.queue.completed,
            failed = report.queue.failed(),
            batches = report.batches,
            overflows = report.overflows,
            "Detail phase finished"
        );
        Ok(report)
    }

    async fn drain(
        &self,
        queue: FetchQueue,
        report: &mut DetailReport,
        handler: &Arc<dyn PageHandler>,
    ) {
        let batch = queue.run(Arc::clone(&self.fetcher), Arc::clone(handler)).await;
        report.batches += 1;
        report.queue.merge(batch);
    }
}
