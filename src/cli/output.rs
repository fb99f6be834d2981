//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::core::HistoryRecord;
use crate::error::Error;
use crate::storage::HistoryStats;
use serde::Serialize;
use std::fmt::Write;
use std::path::PathBuf;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Everything `incsh status` reports.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// History database path.
    pub db_path: PathBuf,
    /// History statistics, if the database exists.
    pub history: Option<HistoryStats>,
    /// Cache directory.
    pub cache_dir: PathBuf,
    /// Number of cached units.
    pub cache_entries: usize,
    /// Output encoding name.
    pub encoding: String,
    /// Decode-error policy name.
    pub errors: String,
    /// Whether interactive input is cached.
    pub cache_everything: bool,
    /// Whether scripts are cached.
    pub cache_scripts: bool,
}

/// Formats a status response.
#[must_use]
pub fn format_status(report: &StatusReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_status_text(report),
        OutputFormat::Json => format_json(report),
    }
}

fn format_status_text(report: &StatusReport) -> String {
    let mut output = String::new();
    output.push_str("incsh Status\n");
    output.push_str("============\n\n");
    let _ = writeln!(output, "  History DB:    {}", report.db_path.display());
    match &report.history {
        Some(stats) => {
            let _ = writeln!(output, "  Records:       {}", stats.record_count);
            let _ = writeln!(output, "  Failed:        {}", stats.failed_count);
            let _ = writeln!(output, "  Schema:        v{}", stats.schema_version);
            if let Some(size) = stats.db_size {
                let _ = writeln!(output, "  DB size:       {size} bytes");
            }
        }
        None => output.push_str("  Records:       (no database)\n"),
    }
    let _ = writeln!(output, "  Cache dir:     {}", report.cache_dir.display());
    let _ = writeln!(output, "  Cached units:  {}", report.cache_entries);
    let _ = writeln!(
        output,
        "  Caching:       interactive={} scripts={}",
        on_off(report.cache_everything),
        on_off(report.cache_scripts)
    );
    let _ = writeln!(output, "  Encoding:      {} ({})", report.encoding, report.errors);
    output
}

/// Formats a list of history records, oldest first.
#[must_use]
pub fn format_history(records: &[HistoryRecord], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_history_text(records),
        OutputFormat::Json => format_json(&records),
    }
}

fn format_history_text(records: &[HistoryRecord]) -> String {
    if records.is_empty() {
        return "No history found.\n".to_string();
    }

    let mut output = String::new();
    let _ = writeln!(output, "{:<6} {:<10} Input", "RTN", "Duration");
    output.push_str(&"-".repeat(60));
    output.push('\n');

    for record in records {
        let rtn = record
            .rtn
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        let first = record.inp.lines().next().unwrap_or("");
        let more = if record.inp.trim_end().contains('\n') {
            " ..."
        } else {
            ""
        };
        let _ = writeln!(
            output,
            "{:<6} {:<10} {}{}",
            rtn,
            format_duration(record.duration()),
            truncate(first, 48),
            more
        );
    }

    output
}

/// Formats an error.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => {
            let json = serde_json::json!({
                "error": error.to_string(),
            });
            serde_json::to_string_pretty(&json).unwrap_or_default()
        }
    }
}

/// Formats a value as pretty JSON.
fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

const fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Formats seconds as a short duration.
fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else {
        format!("{secs:.2}s")
    }
}

/// Truncates a string to max length with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}
