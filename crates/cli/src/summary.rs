//! End-of-run summary printed by the binary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use ostcat_core::{CatalogStats, CrawlReport, DetailReport, PipelineReport};

/// Serializable view of a [`PipelineReport`].
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<CrawlReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<DetailReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CatalogStats>,
}

impl RunSummary {
    pub fn new(
        report: &PipelineReport,
        stats: Option<CatalogStats>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            started_at,
            finished_at,
            duration_secs: (finished_at - started_at).num_seconds(),
            complete: report.is_complete(),
            catalog: report.catalog.clone(),
            catalog_error: report.catalog_error.as_ref().map(|e| e.to_string()),
            details: report.details.clone(),
            details_error: report.details_error.as_ref().map(|e| e.to_string()),
            stats,
        }
    }

    pub fn log(&self) {
        if let Some(catalog) = &self.catalog {
            info!(
                "Catalog phase: {} pages, {} albums ({} new), {} rows skipped, {} failed upserts",
                catalog.pages_visited,
                catalog.albums_upserted,
                catalog.albums_created,
                catalog.rows_skipped,
                catalog.failed_upserts.len()
            );
        }
        if let Some(e) = &self.catalog_error {
            error!("Catalog phase halted: {}", e);
        }

        if let Some(details) = &self.details {
            info!(
                "Detail phase: {} albums, {} completed, {} fetch failures, {} handler failures, {} batches",
                details.albums,
                details.queue.completed,
                details.queue.fetch_failures.len(),
                details.queue.handler_failures.len(),
                details.batches
            );
            if details.overflows > 0 {
                warn!(
                    "Fetch queue overflowed {} times; raise queue.capacity to avoid batching",
                    details.overflows
                );
            }
        }
        if let Some(e) = &self.details_error {
            error!("Detail phase failed: {}", e);
        }

        if let Some(stats) = &self.stats {
            info!(
                "Catalog: {} albums ({} with tracks), {} tracks, {} platforms, {} images",
                stats.total_albums,
                stats.albums_with_tracks,
                stats.total_tracks,
                stats.total_platforms,
                stats.total_images
            );
        }
        info!("Finished in {}s", self.duration_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ostcat_core::{CrawlError, FetchError};

    #[test]
    fn test_summary_of_halted_run() {
        let report = PipelineReport {
            catalog_error: Some(CrawlError::PageFetch {
                url: "https://example.com/game-soundtracks?page=4".to_string(),
                pages_visited: 3,
                source: FetchError::Timeout {
                    url: "https://example.com/game-soundtracks?page=4".to_string(),
                },
            }),
            details: Some(DetailReport::default()),
            ..PipelineReport::default()
        };
        let start = Utc::now();
        let summary = RunSummary::new(&report, None, start, start + Duration::seconds(90));

        assert!(!summary.complete);
        assert_eq!(summary.duration_secs, 90);
        assert!(summary.catalog_error.as_deref().unwrap().contains("after 3 pages"));

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("catalog").is_none());
        assert!(json.get("details").is_some());
        assert_eq!(json["complete"], false);
    }
}
