//! SQLite-backed record store
//!
//! Persists readings in a single `climate_data` table keyed by an
//! autoincrement rowid, which doubles as the [`RecordId`].

use crate::storage::error::StoreResult;
use crate::storage::types::{Reading, Record, RecordId};
use crate::storage::RecordStore;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};

/// Ids per `IN (...)` clause; stays under SQLite's bound-variable limit
const FETCH_CHUNK: usize = 500;

const COLUMNS: &str = "id, timestamp, station_id, metric_name, value, location, tags";

/// Record store backed by a SQLite database file
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Create or open a store at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = 10000;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let store = Self {
            conn,
            path: Some(path),
        };
        store.create_tables()?;

        tracing::debug!("Opened record store at {:?}", store.path);
        Ok(store)
    }

    /// Create a throwaway store that lives only as long as this value
    pub fn in_memory() -> StoreResult<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> StoreResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS climate_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                station_id TEXT NOT NULL,
                metric_name TEXT NOT NULL,
                value REAL NOT NULL,
                location TEXT,
                tags TEXT
            )",
            [],
        )?;

        Ok(())
    }

    /// Database file path (`None` for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
        Ok(Record {
            id: RecordId(row.get(0)?),
            reading: Reading {
                timestamp: row.get(1)?,
                station_id: row.get(2)?,
                metric_name: row.get(3)?,
                value: row.get(4)?,
                location: row.get(5)?,
                tags: row.get(6)?,
            },
        })
    }
}

impl RecordStore for SqliteStore {
    fn append(&mut self, reading: &Reading) -> StoreResult<RecordId> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO climate_data (timestamp, station_id, metric_name, value, location, tags)
             VALUES (?, ?, ?, ?, ?, ?)",
        )?;
        stmt.execute(params![
            reading.timestamp,
            reading.station_id,
            reading.metric_name,
            reading.value,
            reading.location,
            reading.tags,
        ])?;

        Ok(RecordId(self.conn.last_insert_rowid()))
    }

    fn fetch_many(&self, ids: &[RecordId]) -> StoreResult<Vec<Record>> {
        let mut records = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(FETCH_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT {} FROM climate_data WHERE id IN ({}) ORDER BY id",
                COLUMNS, placeholders
            );

            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter().map(|id| id.0)), |row| {
                Self::row_to_record(row)
            })?;
            for row in rows {
                records.push(row?);
            }
        }

        if ids.len() > FETCH_CHUNK {
            records.sort_by_key(|r| r.id);
            records.dedup_by_key(|r| r.id);
        }

        Ok(records)
    }

    fn update_value(&mut self, id: RecordId, value: f64) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE climate_data SET value = ? WHERE id = ?",
            params![value, id.0],
        )?;
        Ok(changed > 0)
    }

    fn delete(&mut self, id: RecordId) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM climate_data WHERE id = ?", params![id.0])?;
        Ok(changed > 0)
    }

    fn scan_all(&self) -> StoreResult<Vec<Record>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {} FROM climate_data ORDER BY timestamp, id",
            COLUMNS
        ))?;
        let rows = stmt.query_map([], |row| Self::row_to_record(row))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM climate_data", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
