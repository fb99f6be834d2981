//! # incsh
//!
//! The interactive execution core of a line-oriented shell.
//!
//! Input arrives one line at a time. The [`compiler::IncrementalCompiler`]
//! buffers lines until they form a complete statement, consulting a
//! content-addressed [`cache::CodeCache`] before compiling. The
//! [`session::ExecutionSession`] runs each compiled unit under a
//! [`tee::Tee`] that shows output live while capturing it, then records
//! one [`core::HistoryRecord`] per unit, whatever the unit did.
//!
//! ## Features
//!
//! - **Incremental compilation**: multi-line statements, string-aware
//!   give-up rules
//! - **Code cache**: units keyed by source hash and validated by
//!   compiler fingerprint and file modification time
//! - **Output tee**: dual-stream capture with per-stream decoration and
//!   configurable decoding
//! - **`SQLite` history**: persistent records with schema versioning
//! - **Built-in language**: a small command language for the binary

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod cache;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod core;
pub mod error;
pub mod lang;
pub mod session;
pub mod storage;
pub mod tee;

// Re-export commonly used types at crate root
pub use error::{Error, ExecError, Result};

// Re-export core domain types
pub use core::{CompileMode, CompiledUnit, Context, Env, HistoryRecord, Value};

// Re-export engine types
pub use cache::{CachePolicy, CodeCache};
pub use compiler::{CompileState, CompilerService, IncrementalCompiler};
pub use session::{ExecutionSession, Executor, PromptState, Runtime};
pub use tee::{StdStreams, StreamId, Tee, TeeConfig};

// Re-export storage types
pub use storage::{DEFAULT_DB_PATH, HistorySink, HistoryStore, MemoryHistory, SqliteHistory};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
