//! Record store wrapper that injects failures.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::catalog::{Album, CatalogStats, RecordStore, StoreError, UpsertOutcome};

/// Wraps a real store and fails selected calls.
///
/// - `busy_upserts(n)`: the next `n` upserts fail with [`StoreError::Busy`]
/// - `reject_album(id)`: every upsert of that album fails permanently
pub struct FlakyStore {
    inner: Arc<dyn RecordStore>,
    busy_upserts: AtomicU32,
    rejected: Mutex<HashSet<String>>,
    upsert_calls: AtomicU32,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            busy_upserts: AtomicU32::new(0),
            rejected: Mutex::new(HashSet::new()),
            upsert_calls: AtomicU32::new(0),
        }
    }

    pub fn busy_upserts(&self, count: u32) {
        self.busy_upserts.store(count, Ordering::SeqCst);
    }

    pub fn reject_album(&self, id: &str) {
        self.rejected.lock().unwrap().insert(id.to_string());
    }

    /// Upsert attempts seen, failed ones included.
    pub fn upsert_calls(&self) -> u32 {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

impl RecordStore for FlakyStore {
    fn upsert_album(&self, album: &Album) -> Result<UpsertOutcome, StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);

        if self.rejected.lock().unwrap().contains(&album.id) {
            return Err(StoreError::Database(format!(
                "constraint failed for {}",
                album.id
            )));
        }

        let busy = self
            .busy_upserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if busy {
            return Err(StoreError::Busy("database is locked".to_string()));
        }

        self.inner.upsert_album(album)
    }

    fn get_album(&self, id: &str) -> Result<Album, StoreError> {
        self.inner.get_album(id)
    }

    fn album_urls(&self) -> Result<Vec<String>, StoreError> {
        self.inner.album_urls()
    }

    fn exists(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.exists(id)
    }

    fn remove_album(&self, id: &str) -> Result<(), StoreError> {
        self.inner.remove_album(id)
    }

    fn stats(&self) -> Result<CatalogStats, StoreError> {
        self.inner.stats()
    }
}
