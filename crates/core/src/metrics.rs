//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Page fetching (requests, failures)
//! - Catalog crawl (index pages, album upserts, skipped rows)
//! - Detail phase (queue jobs, overflow batches, extracted tracks)

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

// =============================================================================
// Fetching
// =============================================================================

/// HTTP requests sent, retries included.
pub static HTTP_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("ostcat_http_requests_total", "Total HTTP requests sent").unwrap()
});

/// Fetches that failed after every retry.
pub static HTTP_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ostcat_http_failures_total",
        "Page fetches that failed after all retries",
    )
    .unwrap()
});

// =============================================================================
// Catalog crawl
// =============================================================================

pub static INDEX_PAGES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("ostcat_index_pages_total", "Index pages processed").unwrap()
});

/// Album upserts by phase and result.
pub static ALBUM_UPSERTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ostcat_album_upserts_total", "Album upserts"),
        &["phase", "result"], // phase: "catalog", "detail"; result: "ok", "failed"
    )
    .unwrap()
});

pub static ROWS_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ostcat_rows_skipped_total",
        "Index rows that did not yield an album id",
    )
    .unwrap()
});

// =============================================================================
// Detail phase
// =============================================================================

/// Queue jobs by result.
pub static QUEUE_JOBS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ostcat_queue_jobs_total", "Fetch queue jobs processed"),
        &["result"], // "completed", "fetch_failed", "handler_failed"
    )
    .unwrap()
});

pub static QUEUE_OVERFLOWS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ostcat_queue_overflows_total",
        "Times the fetch queue was full and a new batch was started",
    )
    .unwrap()
});

pub static TRACKS_EXTRACTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ostcat_tracks_extracted_total",
        "Track rows extracted from detail pages",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(HTTP_REQUESTS.clone()),
        Box::new(HTTP_FAILURES.clone()),
        Box::new(INDEX_PAGES.clone()),
        Box::new(ALBUM_UPSERTS.clone()),
        Box::new(ROWS_SKIPPED.clone()),
        Box::new(QUEUE_JOBS.clone()),
        Box::new(QUEUE_OVERFLOWS.clone()),
        Box::new(TRACKS_EXTRACTED.clone()),
    ]
}
