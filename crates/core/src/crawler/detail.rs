use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use tracing::{debug, info};
use url::Url;

use super::CrawlError;
use crate::catalog::{RecordStore, StoreError};
use crate::extract::{parse_detail_page, SiteLayout};
use crate::metrics;
use crate::queue::PageHandler;
use crate::retry::RetryPolicy;

/// Attaches tracks and metadata from an album page to the stored album.
pub struct DetailExtractor {
    store: Arc<dyn RecordStore>,
    site: SiteLayout,
    store_retry: RetryPolicy,
}

impl DetailExtractor {
    pub fn new(store: Arc<dyn RecordStore>, site: SiteLayout, store_retry: RetryPolicy) -> Self {
        Self {
            store,
            site,
            store_retry,
        }
    }
}

#[async_trait]
impl PageHandler for DetailExtractor {
    async fn handle(&self, url: &Url, body: String) -> Result<(), CrawlError> {
        let album_id = self
            .site
            .album_id(url)
            .ok_or_else(|| CrawlError::UnrecognizedAlbumUrl(url.to_string()))?;

        let detail = {
            let doc = Html::parse_document(&body);
            parse_detail_page(&doc, &self.site)
        };

        let mut album = self
            .store_retry
            .retry("get_album", || async { self.store.get_album(&album_id) })
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => CrawlError::AlbumNotFound(album_id.clone()),
                source => CrawlError::Store {
                    album_id: album_id.clone(),
                    source,
                },
            })?;

        let track_count = detail.tracks.len();
        if track_count == 0 {
            debug!(album_id = %album_id, "Album page has no track rows");
        }
        detail.apply_to(&mut album);

        let outcome = self
            .store_retry
            .retry("upsert_album", || async { self.store.upsert_album(&album) })
            .await
            .map_err(|source| {
                metrics::ALBUM_UPSERTS
                    .with_label_values(&["detail", "failed"])
                    .inc();
                CrawlError::Store {
                    album_id: album_id.clone(),
                    source,
                }
            })?;

        metrics::ALBUM_UPSERTS
            .with_label_values(&["detail", "ok"])
            .inc();
        metrics::TRACKS_EXTRACTED.inc_by(track_count as u64);
        info!(
            album_id = %album_id,
            tracks = track_count,
            inserted = outcome.tracks_inserted,
            updated = outcome.tracks_updated,
            "Album details stored"
        );
        Ok(())
    }
}
