//! History storage for incsh.
//!
//! The execution session hands every finished record to a
//! [`HistorySink`]. Two backends are provided: a `SQLite` database for the
//! binary and an in-memory store for embedding and tests.

pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use memory::MemoryHistory;
pub use schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL};
pub use sqlite::SqliteHistory;
pub use traits::{HistorySink, HistoryStats, HistoryStore};

/// Default database path relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".incsh/history.db";

/// Default cache directory relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".incsh/cache";
