//! Types for the album catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A soundtrack album.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Album {
    /// Slug taken from the detail-page URL path (primary key).
    pub id: String,
    /// Absolute detail-page URL.
    pub url: String,
    pub title: String,
    pub year: String,
    /// Free-text classification (e.g. "Soundtrack", "Arrangement").
    pub album_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_added: Option<String>,
    /// Total runtime as shown by the site (e.g. "1h 2m").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesize_mp3_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesize_flac_bytes: Option<u64>,
    pub platforms: Vec<Platform>,
    pub images: Vec<Image>,
    pub tracks: Vec<Track>,
    /// Set by the store when the album is read back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Album {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn platform_names(&self) -> Vec<&str> {
        self.platforms.iter().map(|p| p.name.as_str()).collect()
    }
}

/// A console or system an album belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub name: String,
}

impl Platform {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Cover art or screenshot attached to an album.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
}

impl Image {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// One row of an album's track table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Store-assigned surrogate key, `None` until persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub album_id: String,
    /// Preferred download page: FLAC when available, otherwise MP3.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mp3_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flac_url: Option<String>,
    pub track_number: u32,
    pub disc_number: u32,
    /// 1-based ordinal of the row among the page's data rows.
    pub position: u32,
    pub title: String,
    pub runtime: String,
    pub mp3_available: bool,
    pub flac_available: bool,
    pub filesize_mp3: String,
    pub filesize_flac: String,
}

impl Track {
    /// Natural key inside an album: `(disc, track, slot)`.
    ///
    /// `slot` is 0 for numbered tracks. Tracks without a usable number fall
    /// back to their row position so they stay distinct.
    pub fn natural_key(&self) -> (u32, u32, u32) {
        let slot = if self.track_number == 0 {
            self.position
        } else {
            0
        };
        (self.disc_number, self.track_number, slot)
    }
}

/// Result of a single album upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    /// The album did not exist before.
    pub created: bool,
    pub tracks_inserted: u32,
    pub tracks_updated: u32,
}

/// Catalog statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_albums: u64,
    /// Albums with at least one track.
    pub albums_with_tracks: u64,
    pub total_tracks: u64,
    pub total_platforms: u64,
    pub total_images: u64,
}

/// Errors for catalog operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    /// The database was busy or locked; the operation can be retried.
    #[error("Database busy: {0}")]
    Busy(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }
}
