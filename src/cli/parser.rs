//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// incsh: an incremental line shell.
///
/// Reads statements line by line, compiles them once complete, runs them
/// under an output tee and records each one in history.
#[derive(Parser, Debug)]
#[command(name = "incsh")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the history database file.
    ///
    /// Defaults to `.incsh/history.db` in the current directory.
    #[arg(short, long, env = "INCSH_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Directory holding cached compiled units.
    ///
    /// Defaults to `incsh` under the user cache directory.
    #[arg(long, env = "INCSH_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Don't record executed statements.
    #[arg(long, global = true)]
    pub no_history: bool,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read statements from stdin and execute them.
    ///
    /// Shows prompts when stdin is a terminal.
    #[command(alias = "shell")]
    Repl,

    /// Execute a script file.
    Run {
        /// Path to the script.
        file: PathBuf,
    },

    /// Inspect or clear command history.
    #[command(subcommand)]
    History(HistoryCommands),

    /// Manage the compiled-unit cache.
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Show history, cache and configuration status.
    Status,
}

/// History subcommands.
#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// List the most recent records.
    #[command(alias = "ls")]
    List {
        /// Maximum number of records.
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Find records whose input contains a string.
    Search {
        /// Text to look for.
        needle: String,

        /// Maximum number of records.
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Delete every record.
    Clear {
        /// Skip confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Cache subcommands.
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Delete every cached unit.
    Clear,
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::storage::DEFAULT_DB_PATH))
    }

    /// Returns the cache directory, using the default if not specified.
    ///
    /// Falls back to `.incsh/cache` when the platform has no cache
    /// directory.
    #[must_use]
    pub fn get_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir().map_or_else(
                || PathBuf::from(crate::storage::DEFAULT_CACHE_DIR),
                |d| d.join("incsh"),
            )
        })
    }
}
