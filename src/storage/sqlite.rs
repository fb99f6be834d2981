//! `SQLite` history implementation.
//!
//! Persists history records with schema versioning and migration support.

// SQLite stores all integers as i64. Counts are non-negative and fit in usize.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::core::{HistoryRecord, RTN_SUCCESS};
use crate::error::{Result, StorageError};
use crate::storage::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL,
};
use crate::storage::traits::{HistorySink, HistoryStats, HistoryStore};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};

/// SQLite-backed history.
///
/// # Examples
///
/// ```no_run
/// use incsh::storage::{HistoryStore, SqliteHistory};
///
/// let mut history = SqliteHistory::open("history.db").unwrap();
/// history.init().unwrap();
/// ```
pub struct SqliteHistory {
    /// `SQLite` connection.
    conn: Connection,
    /// Path to the database file (None for in-memory).
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteHistory")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteHistory {
    /// Opens or creates a history database at the given path.
    ///
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Database(e.to_string()))?;
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;

        // journal_mode returns the resulting mode, so it must be queried
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Creates an in-memory history database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        Ok(Self { conn, path: None })
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Gets the current schema version.
    fn get_schema_version(&self) -> Result<Option<u32>> {
        let version: Option<String> = self
            .conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;

        Ok(version.and_then(|v| v.parse().ok()))
    }

    /// Sets the schema version.
    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn
            .execute(SET_VERSION_SQL, params![version.to_string()])
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized()? {
            Ok(())
        } else {
            Err(StorageError::NotInitialized.into())
        }
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<HistoryRecord> {
        Ok(HistoryRecord {
            inp: row.get(0)?,
            ts: [row.get(1)?, row.get(2)?],
            rtn: row.get(3)?,
            out: row.get(4)?,
        })
    }

    fn query_recent(&self, filter: Option<&str>, limit: usize) -> Result<Vec<HistoryRecord>> {
        self.ensure_initialized()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = r"
            SELECT inp, ts_start, ts_end, rtn, out FROM (
                SELECT id, inp, ts_start, ts_end, rtn, out FROM history
                WHERE ?1 IS NULL OR instr(inp, ?1) > 0
                ORDER BY id DESC
                LIMIT ?2
            ) ORDER BY id ASC
        ";
        let mut stmt = self.conn.prepare(sql).map_err(StorageError::from)?;
        let records = stmt
            .query_map(params![filter, limit], Self::row_to_record)
            .map_err(StorageError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::from)?;
        Ok(records)
    }
}

impl HistorySink for SqliteHistory {
    fn append(&mut self, record: &HistoryRecord) -> Result<()> {
        self.ensure_initialized()?;
        self.conn
            .execute(
                r"
            INSERT INTO history (inp, ts_start, ts_end, rtn, out)
            VALUES (?, ?, ?, ?, ?)
            ",
                params![record.inp, record.ts[0], record.ts[1], record.rtn, record.out],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }
}

impl HistoryStore for SqliteHistory {
    fn init(&mut self) -> Result<()> {
        let is_init: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;

        if is_init == 0 {
            self.conn
                .execute_batch(SCHEMA_SQL)
                .map_err(StorageError::from)?;
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
            tracing::info!(version = CURRENT_SCHEMA_VERSION, "history schema created");
        } else if let Some(current) = self.get_schema_version()?
            && current < CURRENT_SCHEMA_VERSION
        {
            for migration in crate::storage::schema::get_migrations_from(current) {
                self.conn
                    .execute_batch(migration.sql)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
            }
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
            tracing::info!(
                from = current,
                to = CURRENT_SCHEMA_VERSION,
                "history schema migrated"
            );
        }

        Ok(())
    }

    fn is_initialized(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    fn list(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        self.query_recent(None, limit)
    }

    fn search(&self, needle: &str, limit: usize) -> Result<Vec<HistoryRecord>> {
        self.query_recent(Some(needle), limit)
    }

    fn count(&self) -> Result<usize> {
        self.ensure_initialized()?;
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count as usize)
    }

    fn clear(&mut self) -> Result<usize> {
        self.ensure_initialized()?;
        let deleted = self
            .conn
            .execute("DELETE FROM history", [])
            .map_err(StorageError::from)?;
        Ok(deleted)
    }

    fn stats(&self) -> Result<HistoryStats> {
        let record_count = self.count()?;

        let failed: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM history WHERE rtn IS NOT NULL AND rtn != ?",
                params![RTN_SUCCESS],
                |row| row.get(0),
            )
            .map_err(StorageError::from)?;

        let schema_version = self.get_schema_version()?.unwrap_or(0);

        let db_size = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok().map(|m| m.len()));

        Ok(HistoryStats {
            record_count,
            failed_count: failed as usize,
            schema_version,
            db_size,
        })
    }
}
