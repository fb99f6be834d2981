//! History storage traits.
//!
//! [`HistorySink`] is the only thing the execution session needs: a place
//! to hand each finished record. [`HistoryStore`] adds the queries used by
//! the CLI.

use crate::core::HistoryRecord;
use crate::error::Result;
use serde::Serialize;

/// Receives one record per executed unit.
pub trait HistorySink {
    /// Appends a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record can't be persisted.
    fn append(&mut self, record: &HistoryRecord) -> Result<()>;
}

/// Queryable history backend.
pub trait HistoryStore: HistorySink {
    /// Initializes storage (creates schema, runs migrations).
    ///
    /// Should be idempotent - safe to call multiple times.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation or migration fails.
    fn init(&mut self) -> Result<()>;

    /// Checks if storage is initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be performed.
    fn is_initialized(&self) -> Result<bool>;

    /// Returns up to `limit` most recent records, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn list(&self, limit: usize) -> Result<Vec<HistoryRecord>>;

    /// Returns up to `limit` most recent records whose input contains
    /// `needle`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn search(&self, needle: &str, limit: usize) -> Result<Vec<HistoryRecord>>;

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    fn count(&self) -> Result<usize>;

    /// Deletes every record, returning how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn clear(&mut self) -> Result<usize>;

    /// Gets storage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be computed.
    fn stats(&self) -> Result<HistoryStats>;
}

/// History statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    /// Number of records.
    pub record_count: usize,
    /// Records with a non-zero return code.
    pub failed_count: usize,
    /// Schema version.
    pub schema_version: u32,
    /// Database file size in bytes (if applicable).
    pub db_size: Option<u64>,
}
