//! Album catalog - the relational record store the crawler writes into.
//!
//! Albums are keyed by their URL slug, tracks by a store-assigned id with a
//! natural key of album id plus [`Track::natural_key`].

mod sqlite;
mod types;

pub use sqlite::SqliteStore;
pub use types::*;

/// Trait for album catalog storage.
pub trait RecordStore: Send + Sync {
    /// Insert or update an album by primary key.
    ///
    /// Empty summary fields and `None` detail fields never overwrite stored
    /// values. Platforms and images are added to the existing associations.
    /// Tracks are upserted by natural key, so repeated calls with the same
    /// tracks do not create duplicates. Stored tracks absent from
    /// `album.tracks` are left in place; removal only happens through
    /// [`RecordStore::remove_album`].
    fn upsert_album(&self, album: &Album) -> Result<UpsertOutcome, StoreError>;

    /// Get an album with its platforms, images and tracks.
    fn get_album(&self, id: &str) -> Result<Album, StoreError>;

    /// Detail-page URLs of every stored album.
    fn album_urls(&self) -> Result<Vec<String>, StoreError>;

    /// Check if an album exists in the catalog.
    fn exists(&self, id: &str) -> Result<bool, StoreError>;

    /// Remove an album. Its tracks and association rows go with it.
    fn remove_album(&self, id: &str) -> Result<(), StoreError>;

    /// Get catalog statistics.
    fn stats(&self) -> Result<CatalogStats, StoreError>;
}
