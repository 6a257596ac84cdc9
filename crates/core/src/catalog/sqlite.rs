//! SQLite-backed album catalog implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};

use super::{
    Album, CatalogStats, Image, Platform, RecordStore, StoreError, Track, UpsertOutcome,
};

/// How long SQLite waits on a locked database before reporting busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed album catalog.
///
/// The connection is guarded by a mutex and every upsert runs in its own
/// transaction, so concurrent writers to the same album are serialized.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ) =>
        {
            StoreError::Busy(e.to_string())
        }
        _ => StoreError::Database(e.to_string()),
    }
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl SqliteStore {
    /// Create a new SQLite store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- One row per album slug
            CREATE TABLE IF NOT EXISTS albums (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                year TEXT NOT NULL DEFAULT '',
                album_type TEXT NOT NULL DEFAULT '',
                date_added TEXT,
                runtime TEXT,
                file_count INTEGER,
                filesize_mp3_bytes INTEGER,
                filesize_flac_bytes INTEGER,
                first_seen_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS platforms (
                name TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS images (
                url TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS album_platforms (
                album_id TEXT NOT NULL REFERENCES albums(id) ON DELETE CASCADE,
                platform_name TEXT NOT NULL REFERENCES platforms(name),
                PRIMARY KEY (album_id, platform_name)
            );

            CREATE TABLE IF NOT EXISTS album_images (
                album_id TEXT NOT NULL REFERENCES albums(id) ON DELETE CASCADE,
                image_url TEXT NOT NULL REFERENCES images(url),
                PRIMARY KEY (album_id, image_url)
            );

            -- Tracks, unique per (album, disc, track, slot); slot is the row
            -- position for tracks without a number and 0 otherwise
            CREATE TABLE IF NOT EXISTS tracks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                album_id TEXT NOT NULL REFERENCES albums(id) ON DELETE CASCADE,
                url TEXT,
                mp3_url TEXT,
                flac_url TEXT,
                track_number INTEGER NOT NULL,
                disc_number INTEGER NOT NULL,
                slot INTEGER NOT NULL,
                position INTEGER NOT NULL,
                title TEXT NOT NULL,
                runtime TEXT NOT NULL,
                mp3_available INTEGER NOT NULL DEFAULT 0,
                flac_available INTEGER NOT NULL DEFAULT 0,
                filesize_mp3 TEXT NOT NULL DEFAULT '',
                filesize_flac TEXT NOT NULL DEFAULT '',
                UNIQUE(album_id, disc_number, track_number, slot)
            );

            CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks(album_id);
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Internal("connection mutex poisoned".to_string()))
    }

    fn album_exists(conn: &Connection, id: &str) -> Result<bool, StoreError> {
        conn.query_row("SELECT 1 FROM albums WHERE id = ?", params![id], |_| {
            Ok(true)
        })
        .optional()
        .map(|found| found.unwrap_or(false))
        .map_err(db_err)
    }

    fn write_album_row(tx: &Transaction, album: &Album, now: &str) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO albums (id, url, title, year, album_type, date_added, runtime,
                                 file_count, filesize_mp3_bytes, filesize_flac_bytes,
                                 first_seen_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
             ON CONFLICT(id) DO UPDATE SET
                url = CASE WHEN excluded.url = '' THEN albums.url ELSE excluded.url END,
                title = CASE WHEN excluded.title = '' THEN albums.title ELSE excluded.title END,
                year = CASE WHEN excluded.year = '' THEN albums.year ELSE excluded.year END,
                album_type = CASE WHEN excluded.album_type = '' THEN albums.album_type ELSE excluded.album_type END,
                date_added = COALESCE(excluded.date_added, albums.date_added),
                runtime = COALESCE(excluded.runtime, albums.runtime),
                file_count = COALESCE(excluded.file_count, albums.file_count),
                filesize_mp3_bytes = COALESCE(excluded.filesize_mp3_bytes, albums.filesize_mp3_bytes),
                filesize_flac_bytes = COALESCE(excluded.filesize_flac_bytes, albums.filesize_flac_bytes),
                updated_at = excluded.updated_at",
            params![
                &album.id,
                &album.url,
                &album.title,
                &album.year,
                &album.album_type,
                &album.date_added,
                &album.runtime,
                album.file_count,
                album.filesize_mp3_bytes.map(|b| b as i64),
                album.filesize_flac_bytes.map(|b| b as i64),
                now,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn link_platforms(tx: &Transaction, album_id: &str, platforms: &[Platform]) -> Result<(), StoreError> {
        for platform in platforms {
            let name = platform.name.trim();
            if name.is_empty() {
                continue;
            }
            tx.execute(
                "INSERT OR IGNORE INTO platforms (name) VALUES (?)",
                params![name],
            )
            .map_err(db_err)?;
            tx.execute(
                "INSERT OR IGNORE INTO album_platforms (album_id, platform_name) VALUES (?, ?)",
                params![album_id, name],
            )
            .map_err(db_err)?;
        }
        Ok(())
    }

    fn link_images(tx: &Transaction, album_id: &str, images: &[Image]) -> Result<(), StoreError> {
        for image in images {
            if image.url.is_empty() {
                continue;
            }
            tx.execute(
                "INSERT OR IGNORE INTO images (url) VALUES (?)",
                params![&image.url],
            )
            .map_err(db_err)?;
            tx.execute(
                "INSERT OR IGNORE INTO album_images (album_id, image_url) VALUES (?, ?)",
                params![album_id, &image.url],
            )
            .map_err(db_err)?;
        }
        Ok(())
    }

    /// Upsert one track by natural key. Returns true if a new row was inserted.
    fn write_track(tx: &Transaction, album_id: &str, track: &Track) -> Result<bool, StoreError> {
        let (disc, number, slot) = track.natural_key();

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM tracks
                 WHERE album_id = ? AND disc_number = ? AND track_number = ? AND slot = ?",
                params![album_id, disc, number, slot],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE tracks SET url = ?, mp3_url = ?, flac_url = ?, position = ?, title = ?,
                        runtime = ?, mp3_available = ?, flac_available = ?,
                        filesize_mp3 = ?, filesize_flac = ?
                     WHERE id = ?",
                    params![
                        &track.url,
                        &track.mp3_url,
                        &track.flac_url,
                        track.position,
                        &track.title,
                        &track.runtime,
                        track.mp3_available,
                        track.flac_available,
                        &track.filesize_mp3,
                        &track.filesize_flac,
                        id,
                    ],
                )
                .map_err(db_err)?;
                Ok(false)
            }
            None => {
                tx.execute(
                    "INSERT INTO tracks (album_id, url, mp3_url, flac_url, track_number, disc_number,
                                         slot, position, title, runtime, mp3_available, flac_available,
                                         filesize_mp3, filesize_flac)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    params![
                        album_id,
                        &track.url,
                        &track.mp3_url,
                        &track.flac_url,
                        number,
                        disc,
                        slot,
                        track.position,
                        &track.title,
                        &track.runtime,
                        track.mp3_available,
                        track.flac_available,
                        &track.filesize_mp3,
                        &track.filesize_flac,
                    ],
                )
                .map_err(db_err)?;
                Ok(true)
            }
        }
    }

    fn row_to_album(row: &rusqlite::Row) -> rusqlite::Result<Album> {
        let mp3_bytes: Option<i64> = row.get(8)?;
        let flac_bytes: Option<i64> = row.get(9)?;

        Ok(Album {
            id: row.get(0)?,
            url: row.get(1)?,
            title: row.get(2)?,
            year: row.get(3)?,
            album_type: row.get(4)?,
            date_added: row.get(5)?,
            runtime: row.get(6)?,
            file_count: row.get(7)?,
            filesize_mp3_bytes: mp3_bytes.map(|b| b as u64),
            filesize_flac_bytes: flac_bytes.map(|b| b as u64),
            platforms: Vec::new(), // Loaded separately
            images: Vec::new(),
            tracks: Vec::new(),
            first_seen_at: parse_timestamp(row.get(10)?),
            updated_at: parse_timestamp(row.get(11)?),
        })
    }

    fn load_platforms(conn: &Connection, album_id: &str) -> Result<Vec<Platform>, StoreError> {
        let mut stmt = conn
            .prepare(
                "SELECT platform_name FROM album_platforms WHERE album_id = ? ORDER BY platform_name",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![album_id], |row| Ok(Platform { name: row.get(0)? }))
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn load_images(conn: &Connection, album_id: &str) -> Result<Vec<Image>, StoreError> {
        let mut stmt = conn
            .prepare("SELECT image_url FROM album_images WHERE album_id = ? ORDER BY image_url")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![album_id], |row| Ok(Image { url: row.get(0)? }))
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn load_tracks(conn: &Connection, album_id: &str) -> Result<Vec<Track>, StoreError> {
        let mut stmt = conn
            .prepare(
                "SELECT id, album_id, url, mp3_url, flac_url, track_number, disc_number, position,
                        title, runtime, mp3_available, flac_available, filesize_mp3, filesize_flac
                 FROM tracks WHERE album_id = ?
                 ORDER BY disc_number, track_number, position",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![album_id], |row| {
                Ok(Track {
                    id: row.get(0)?,
                    album_id: row.get(1)?,
                    url: row.get(2)?,
                    mp3_url: row.get(3)?,
                    flac_url: row.get(4)?,
                    track_number: row.get(5)?,
                    disc_number: row.get(6)?,
                    position: row.get(7)?,
                    title: row.get(8)?,
                    runtime: row.get(9)?,
                    mp3_available: row.get(10)?,
                    flac_available: row.get(11)?,
                    filesize_mp3: row.get(12)?,
                    filesize_flac: row.get(13)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn count(conn: &Connection, sql: &str) -> Result<u64, StoreError> {
        let n: i64 = conn.query_row(sql, [], |row| row.get(0)).map_err(db_err)?;
        Ok(n as u64)
    }
}

impl RecordStore for SqliteStore {
    fn upsert_album(&self, album: &Album) -> Result<UpsertOutcome, StoreError> {
        if album.id.is_empty() {
            return Err(StoreError::Internal("album id is empty".to_string()));
        }

        let mut conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction().map_err(db_err)?;

        let created = !Self::album_exists(&tx, &album.id)?;
        Self::write_album_row(&tx, album, &now)?;
        Self::link_platforms(&tx, &album.id, &album.platforms)?;
        Self::link_images(&tx, &album.id, &album.images)?;

        let mut outcome = UpsertOutcome {
            created,
            ..UpsertOutcome::default()
        };
        for track in &album.tracks {
            if Self::write_track(&tx, &album.id, track)? {
                outcome.tracks_inserted += 1;
            } else {
                outcome.tracks_updated += 1;
            }
        }

        tx.commit().map_err(db_err)?;
        Ok(outcome)
    }

    fn get_album(&self, id: &str) -> Result<Album, StoreError> {
        let conn = self.lock()?;

        let mut album = conn
            .query_row(
                "SELECT id, url, title, year, album_type, date_added, runtime, file_count,
                        filesize_mp3_bytes, filesize_flac_bytes, first_seen_at, updated_at
                 FROM albums WHERE id = ?",
                params![id],
                Self::row_to_album,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(id.to_string()),
                _ => db_err(e),
            })?;

        album.platforms = Self::load_platforms(&conn, id)?;
        album.images = Self::load_images(&conn, id)?;
        album.tracks = Self::load_tracks(&conn, id)?;

        Ok(album)
    }

    fn album_urls(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT url FROM albums ORDER BY id")
            .map_err(db_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(db_err)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(db_err)
    }

    fn exists(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        Self::album_exists(&conn, id)
    }

    fn remove_album(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;

        // Cascades to tracks and association rows
        let rows_affected = conn
            .execute("DELETE FROM albums WHERE id = ?", params![id])
            .map_err(db_err)?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        Ok(())
    }

    fn stats(&self) -> Result<CatalogStats, StoreError> {
        let conn = self.lock()?;

        Ok(CatalogStats {
            total_albums: Self::count(&conn, "SELECT COUNT(*) FROM albums")?,
            albums_with_tracks: Self::count(
                &conn,
                "SELECT COUNT(DISTINCT album_id) FROM tracks",
            )?,
            total_tracks: Self::count(&conn, "SELECT COUNT(*) FROM tracks")?,
            total_platforms: Self::count(&conn, "SELECT COUNT(*) FROM platforms")?,
            total_images: Self::count(&conn, "SELECT COUNT(*) FROM images")?,
        })
    }
}
