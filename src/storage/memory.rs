//! In-memory history.

use std::sync::{Arc, Mutex, PoisonError};

use crate::core::{HistoryRecord, RTN_SUCCESS};
use crate::error::Result;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;
use crate::storage::traits::{HistorySink, HistoryStats, HistoryStore};

/// History kept in a shared `Vec`.
///
/// Clones share the same records, so a caller can keep a handle while the
/// session owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    records: Arc<Mutex<Vec<HistoryRecord>>>,
}

impl MemoryHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<HistoryRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn matching(&self, needle: Option<&str>, limit: usize) -> Vec<HistoryRecord> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut found: Vec<_> = records
            .iter()
            .rev()
            .filter(|r| needle.is_none_or(|n| r.inp.contains(n)))
            .take(limit)
            .cloned()
            .collect();
        found.reverse();
        found
    }
}

impl HistorySink for MemoryHistory {
    fn append(&mut self, record: &HistoryRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

impl HistoryStore for MemoryHistory {
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_initialized(&self) -> Result<bool> {
        Ok(true)
    }

    fn list(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        Ok(self.matching(None, limit))
    }

    fn search(&self, needle: &str, limit: usize) -> Result<Vec<HistoryRecord>> {
        Ok(self.matching(Some(needle), limit))
    }

    fn count(&self) -> Result<usize> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len())
    }

    fn clear(&mut self) -> Result<usize> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let n = records.len();
        records.clear();
        Ok(n)
    }

    fn stats(&self) -> Result<HistoryStats> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(HistoryStats {
            record_count: records.len(),
            failed_count: records
                .iter()
                .filter(|r| r.rtn.is_some_and(|rtn| rtn != RTN_SUCCESS))
                .count(),
            schema_version: CURRENT_SCHEMA_VERSION,
            db_size: None,
        })
    }
}
