use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};
use url::Url;

use super::{FailedJob, PageHandler, QueueError, QueueReport, Submission};
use crate::config::{QueueConfig, MAX_QUEUE_CAPACITY};
use crate::fetch::PageFetcher;
use crate::metrics;

/// Bounded work queue of page URLs with a visited set.
///
/// Submissions never block: a full backlog is reported as
/// [`QueueError::Full`] and left to the caller.
pub struct FetchQueue {
    tx: mpsc::Sender<Url>,
    rx: mpsc::Receiver<Url>,
    seen: Mutex<HashSet<String>>,
    capacity: usize,
    workers: usize,
}

impl FetchQueue {
    pub fn new(config: &QueueConfig) -> Self {
        let capacity = config.capacity.clamp(1, MAX_QUEUE_CAPACITY);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx,
            seen: Mutex::new(HashSet::new()),
            capacity,
            workers: config.workers.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// URLs accepted and not yet taken by a worker.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Accept a URL unless it was accepted before or the backlog is full.
    pub fn submit(&self, url: Url) -> Result<Submission, QueueError> {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.contains(url.as_str()) {
            return Ok(Submission::Duplicate);
        }

        let key = url.to_string();
        match self.tx.try_send(url) {
            Ok(()) => {
                seen.insert(key);
                Ok(Submission::Queued)
            }
            Err(TrySendError::Full(url)) => Err(QueueError::Full {
                capacity: self.capacity,
                url: url.to_string(),
            }),
            Err(TrySendError::Closed(url)) => Err(QueueError::Closed {
                url: url.to_string(),
            }),
        }
    }

    /// Drain the backlog through the worker pool.
    ///
    /// Returns once every accepted URL has been fetched and handled or has
    /// failed.
    pub async fn run(
        self,
        fetcher: Arc<dyn PageFetcher>,
        handler: Arc<dyn PageHandler>,
    ) -> QueueReport {
        let pending = self.pending();
        let FetchQueue {
            tx, rx, workers, ..
        } = self;
        drop(tx);

        info!(pending = pending, workers = workers, "Starting fetch queue");

        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let progress = Arc::new(Mutex::new(Progress::default()));
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    Arc::clone(&rx),
                    Arc::clone(&fetcher),
                    Arc::clone(&handler),
                    Arc::clone(&progress),
                ))
            })
            .collect();

        for (worker, handle) in handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(worker = worker, error = %e, "Queue worker panicked");
                let mut state = lock(&progress);
                let url = state
                    .in_flight
                    .remove(&worker)
                    .unwrap_or_else(|| format!("worker {}", worker));
                metrics::QUEUE_JOBS.with_label_values(&["handler_failed"]).inc();
                state.report.handler_failures.push(FailedJob {
                    url,
                    error: format!("worker {} panicked: {}", worker, e),
                });
            }
        }

        let report = std::mem::take(&mut lock(&progress).report);
        info!(
            completed = report.completed,
            fetch_failures = report.fetch_failures.len(),
            handler_failures = report.handler_failures.len(),
            "Fetch queue drained"
        );
        report
    }
}

/// Results shared by all workers of one run, updated after every job.
#[derive(Default)]
struct Progress {
    report: QueueReport,
    /// URL each worker is currently processing.
    in_flight: HashMap<usize, String>,
}

fn lock(progress: &Mutex<Progress>) -> std::sync::MutexGuard<'_, Progress> {
    progress.lock().unwrap_or_else(|e| e.into_inner())
}

async fn run_worker(
    worker: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Url>>>,
    fetcher: Arc<dyn PageFetcher>,
    handler: Arc<dyn PageHandler>,
    progress: Arc<Mutex<Progress>>,
) {
    let mut completed = 0usize;

    loop {
        // Lock only for the dequeue; all senders are gone, so recv never parks.
        let next = rx.lock().await.recv().await;
        let Some(url) = next else {
            break;
        };
        lock(&progress).in_flight.insert(worker, url.to_string());

        debug!(worker = worker, url = %url, "Fetching");
        let result = match fetcher.fetch(&url).await {
            Ok(body) => handler.handle(&url, body).await,
            Err(e) => {
                warn!(worker = worker, url = %url, error = %e, "Fetch failed");
                metrics::QUEUE_JOBS.with_label_values(&["fetch_failed"]).inc();
                let mut state = lock(&progress);
                state.in_flight.remove(&worker);
                state.report.fetch_failures.push(FailedJob {
                    url: url.to_string(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let mut state = lock(&progress);
        state.in_flight.remove(&worker);
        match result {
            Ok(()) => {
                metrics::QUEUE_JOBS.with_label_values(&["completed"]).inc();
                state.report.completed += 1;
                completed += 1;
            }
            Err(e) => {
                error!(worker = worker, url = %url, error = %e, "Page handler failed");
                metrics::QUEUE_JOBS.with_label_values(&["handler_failed"]).inc();
                state.report.handler_failures.push(FailedJob {
                    url: url.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    debug!(worker = worker, completed = completed, "Worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlError;
    use crate::testing::MockFetcher;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingHandler {
        handled: Mutex<Vec<String>>,
        fail_on: Option<String>,
        panic_on: Option<String>,
    }

    #[async_trait]
    impl PageHandler for RecordingHandler {
        async fn handle(&self, url: &Url, _body: String) -> Result<(), CrawlError> {
            if self.fail_on.as_deref() == Some(url.as_str()) {
                return Err(CrawlError::UnrecognizedAlbumUrl(url.to_string()));
            }
            if self.panic_on.as_deref() == Some(url.as_str()) {
                panic!("handler blew up on {}", url);
            }
            self.handled.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    fn url(n: usize) -> Url {
        Url::parse(&format!("https://example.com/game-soundtracks/album/a{}", n)).unwrap()
    }

    fn queue(workers: usize, capacity: usize) -> FetchQueue {
        FetchQueue::new(&QueueConfig { workers, capacity })
    }

    #[test]
    fn test_duplicate_submission() {
        let q = queue(2, 10);
        assert_eq!(q.submit(url(1)).unwrap(), Submission::Queued);
        assert_eq!(q.submit(url(1)).unwrap(), Submission::Duplicate);
        assert_eq!(q.submit(url(2)).unwrap(), Submission::Queued);
        assert_eq!(q.pending(), 2);
    }

    #[test]
    fn test_full_queue_rejects_without_marking_seen() {
        let q = queue(1, 2);
        q.submit(url(1)).unwrap();
        q.submit(url(2)).unwrap();

        let err = q.submit(url(3)).unwrap_err();
        match err {
            QueueError::Full { capacity, url } => {
                assert_eq!(capacity, 2);
                assert!(url.ends_with("/a3"));
            }
            other => panic!("expected Full, got {:?}", other),
        }
        // Still full, and still not a duplicate
        assert!(matches!(q.submit(url(3)), Err(QueueError::Full { .. })));
        assert_eq!(q.pending(), 2);
    }

    #[tokio::test]
    async fn test_run_fetches_each_url_once() {
        let fetcher = Arc::new(MockFetcher::new());
        for n in 0..20 {
            fetcher.set_page(url(n).as_str(), "<html></html>");
        }
        let handler = Arc::new(RecordingHandler::default());

        let q = queue(3, 100);
        for n in 0..20 {
            q.submit(url(n)).unwrap();
            q.submit(url(n)).unwrap();
        }
        let report = q.run(fetcher.clone(), handler.clone()).await;

        assert_eq!(report.completed, 20);
        assert_eq!(report.failed(), 0);
        assert_eq!(fetcher.request_count(), 20);
        let mut handled = handler.handled.lock().unwrap().clone();
        handled.sort();
        handled.dedup();
        assert_eq!(handled.len(), 20);
    }

    #[tokio::test]
    async fn test_failures_are_recorded_and_processing_continues() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.set_page(url(1).as_str(), "ok");
        fetcher.set_page(url(3).as_str(), "ok");
        // url(2) is unknown to the mock and fails with 404
        let handler = Arc::new(RecordingHandler {
            fail_on: Some(url(3).to_string()),
            ..RecordingHandler::default()
        });

        let q = queue(2, 10);
        for n in 1..=3 {
            q.submit(url(n)).unwrap();
        }
        let report = q.run(fetcher, handler).await;

        assert_eq!(report.completed, 1);
        assert_eq!(report.fetch_failures.len(), 1);
        assert_eq!(report.fetch_failures[0].url, url(2).to_string());
        assert_eq!(report.handler_failures.len(), 1);
        assert_eq!(report.handler_failures[0].url, url(3).to_string());
        assert_eq!(report.processed(), 3);
    }

    #[tokio::test]
    async fn test_worker_panic_keeps_counts_and_records_job() {
        let fetcher = Arc::new(MockFetcher::new());
        for n in 1..=6 {
            fetcher.set_page(url(n).as_str(), "ok");
        }
        let handler = Arc::new(RecordingHandler {
            panic_on: Some(url(1).to_string()),
            ..RecordingHandler::default()
        });

        let q = queue(2, 10);
        for n in 1..=6 {
            q.submit(url(n)).unwrap();
        }
        let report = q.run(fetcher, handler.clone()).await;

        assert_eq!(report.completed, 5);
        assert_eq!(report.handler_failures.len(), 1);
        assert_eq!(report.handler_failures[0].url, url(1).to_string());
        assert!(report.handler_failures[0].error.contains("panicked"));
        assert_eq!(report.processed(), 6);
        assert_eq!(handler.handled.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_empty_queue_returns_immediately() {
        let report = queue(2, 10)
            .run(
                Arc::new(MockFetcher::new()),
                Arc::new(RecordingHandler::default()),
            )
            .await;
        assert_eq!(report.processed(), 0);
    }
}
