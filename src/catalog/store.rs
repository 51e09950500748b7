use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::{CatalogRecord, CatalogStore, ProgressBackend, Provenance};
use crate::sqlite_persistence::{open_versioned, open_versioned_read_only};
use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

const RECORD_COLUMNS: &str = "id, title, title_lower, artist, artist_id, album, album_id, \
     duration_seconds, artwork_ref, audio_ref, genre, license_description, provider_name, \
     provider_url";

const UPSERT_SQL: &str = "INSERT INTO tracks (id, title, title_lower, artist, artist_id, album, \
     album_id, duration_seconds, artwork_ref, audio_ref, genre, license_description, \
     provider_name, provider_url) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) \
     ON CONFLICT(id) DO UPDATE SET title = excluded.title, title_lower = excluded.title_lower, \
     artist = excluded.artist, artist_id = excluded.artist_id, album = excluded.album, \
     album_id = excluded.album_id, duration_seconds = excluded.duration_seconds, \
     artwork_ref = excluded.artwork_ref, audio_ref = excluded.audio_ref, genre = excluded.genre, \
     license_description = excluded.license_description, \
     provider_name = excluded.provider_name, provider_url = excluded.provider_url";

/// SQLite-backed catalog and progress store.
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path.as_ref(), CATALOG_VERSIONED_SCHEMAS, "catalog")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an existing catalog read-only; every write fails.
    pub fn open_read_only<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_read_only(db_path.as_ref(), CATALOG_VERSIONED_SCHEMAS, "catalog")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        CATALOG_VERSIONED_SCHEMAS
            .last()
            .context("No schemas defined")?
            .create(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("catalog connection mutex poisoned"))
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<CatalogRecord> {
        Ok(CatalogRecord {
            id: row.get("id")?,
            title: row.get("title")?,
            title_lower: row.get("title_lower")?,
            artist: row.get("artist")?,
            artist_id: row.get("artist_id")?,
            album: row.get("album")?,
            album_id: row.get("album_id")?,
            duration_seconds: row.get("duration_seconds")?,
            artwork_ref: row.get("artwork_ref")?,
            audio_ref: row.get("audio_ref")?,
            genre: row.get("genre")?,
            license_description: row.get("license_description")?,
            provenance: Provenance {
                provider_name: row.get("provider_name")?,
                provider_url: row.get("provider_url")?,
            },
        })
    }

    fn upsert(conn: &Connection, record: &CatalogRecord) -> rusqlite::Result<usize> {
        conn.execute(
            UPSERT_SQL,
            params![
                record.id,
                record.title,
                record.title_lower,
                record.artist,
                record.artist_id,
                record.album,
                record.album_id,
                record.duration_seconds,
                record.artwork_ref,
                record.audio_ref,
                record.genre,
                record.license_description,
                record.provenance.provider_name,
                record.provenance.provider_url,
            ],
        )
    }

    /// Insertion timestamp stamped by the database, if the record exists.
    pub fn inserted_at(&self, id: &str) -> Result<Option<i64>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT inserted_at FROM tracks WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn get_record(&self, id: &str) -> Result<Option<CatalogRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM tracks WHERE id = ?1", RECORD_COLUMNS),
                params![id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id FROM tracks WHERE id IN ({})",
            placeholders
        ))?;
        let found = stmt
            .query_map(params_from_iter(ids.iter()), |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<String>>>()?;
        Ok(found)
    }

    fn put_record(&self, record: &CatalogRecord) -> Result<()> {
        let conn = self.lock()?;
        Self::upsert(&conn, record).with_context(|| format!("Failed to write {}", record.id))?;
        Ok(())
    }

    fn commit_batch(&self, records: &[CatalogRecord]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for record in records {
            Self::upsert(&tx, record).with_context(|| format!("Failed to write {}", record.id))?;
        }
        tx.commit().context("Failed to commit catalog batch")?;
        Ok(())
    }

    fn list_records(&self, after_id: Option<&str>, limit: usize) -> Result<Vec<CatalogRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tracks WHERE id > ?1 ORDER BY id LIMIT ?2",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map(
                params![after_id.unwrap_or(""), limit as i64],
                Self::row_to_record,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn count_records(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl ProgressBackend for SqliteCatalogStore {
    fn get_progress_document(&self, path: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let document = conn
            .query_row(
                "SELECT document FROM ingest_progress WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(document)
    }

    fn set_progress_document(&self, path: &str, document: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO ingest_progress (path, document) VALUES (?1, ?2) \
             ON CONFLICT(path) DO UPDATE SET document = excluded.document, \
             updated_at = cast(strftime('%s','now') as int)",
            params![path, document],
        )?;
        Ok(())
    }
}
