//! CLI layer for incsh.
//!
//! Provides the command-line interface using clap: an interactive loop,
//! script execution, and history and cache maintenance.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::{BuiltinSession, build_session, drive, execute};
pub use output::OutputFormat;
pub use parser::{CacheCommands, Cli, Commands, HistoryCommands};
