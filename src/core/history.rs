//! History records and per-command status.

use serde::{Deserialize, Serialize};

/// Return code recorded for a successful statement.
pub const RTN_SUCCESS: i32 = 0;

/// Return code recorded for a failed statement.
pub const RTN_FAILURE: i32 = 1;

/// The durable record of one executed unit.
///
/// Built by the execution session during a single cycle and handed to the
/// history sink exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Source text that was executed.
    pub inp: String,

    /// Start and end of execution, Unix seconds.
    pub ts: [f64; 2],

    /// Return code, if one was resolved.
    pub rtn: Option<i32>,

    /// Output the user saw, if any.
    pub out: Option<String>,
}

impl HistoryRecord {
    /// Wall-clock duration in seconds.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.ts[1] - self.ts[0]
    }

    /// Returns `true` if the recorded return code is zero.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.rtn == Some(RTN_SUCCESS)
    }
}

/// Mutable per-command state shared between the session and the executor.
///
/// Executed statements may set `return_code` or `output` themselves (for
/// example an `exit 3` builtin); the session only fills in defaults for
/// what is still unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandStatus {
    /// Pending return code of the running command.
    pub return_code: Option<i32>,

    /// Output captured by some other mechanism than the tee.
    pub output: Option<String>,

    /// Set when an executed statement asked the shell to terminate.
    pub exit_requested: bool,
}

impl CommandStatus {
    /// Sets the return code unless something already set it.
    pub fn default_return_code(&mut self, code: i32) {
        self.return_code.get_or_insert(code);
    }

    /// Clears the per-command fields, keeping the exit request.
    pub fn clear_command(&mut self) {
        self.return_code = None;
        self.output = None;
    }
}

/// Merges tee capture with externally recorded output.
///
/// Both present: tee capture, a newline, then the external output. One
/// present: that one. An empty tee capture counts as absent.
#[must_use]
pub fn merge_output(tee_out: Option<String>, last_out: Option<String>) -> Option<String> {
    let tee_out = tee_out.filter(|s| !s.is_empty());
    match (tee_out, last_out) {
        (None, None) => None,
        (Some(tee), None) => Some(tee),
        (None, Some(last)) => Some(last),
        (Some(tee), Some(last)) => Some(format!("{tee}\n{last}")),
    }
}

/// Returns the current time as fractional Unix seconds.
#[must_use]
pub fn now_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_return_code_keeps_existing() {
        let mut status = CommandStatus::default();
        status.default_return_code(RTN_SUCCESS);
        assert_eq!(status.return_code, Some(0));

        let mut status = CommandStatus {
            return_code: Some(3),
            ..Default::default()
        };
        status.default_return_code(RTN_FAILURE);
        assert_eq!(status.return_code, Some(3));
    }

    #[test]
    fn test_clear_command_keeps_exit_flag() {
        let mut status = CommandStatus {
            return_code: Some(2),
            output: Some("x".to_string()),
            exit_requested: true,
        };
        status.clear_command();
        assert_eq!(status.return_code, None);
        assert_eq!(status.output, None);
        assert!(status.exit_requested);
    }

    #[test]
    fn test_merge_output() {
        assert_eq!(merge_output(None, None), None);
        assert_eq!(merge_output(Some(String::new()), None), None);
        assert_eq!(
            merge_output(Some("tee".to_string()), None),
            Some("tee".to_string())
        );
        assert_eq!(
            merge_output(Some(String::new()), Some("last".to_string())),
            Some("last".to_string())
        );
        assert_eq!(
            merge_output(Some("tee".to_string()), Some("last".to_string())),
            Some("tee\nlast".to_string())
        );
    }

    #[test]
    fn test_record_helpers() {
        let record = HistoryRecord {
            inp: "echo hi\n".to_string(),
            ts: [10.0, 12.5],
            rtn: Some(0),
            out: Some("hi\n".to_string()),
        };
        assert!((record.duration() - 2.5).abs() < f64::EPSILON);
        assert!(record.succeeded());
    }

    #[test]
    fn test_now_timestamp_monotonic_enough() {
        let a = now_timestamp();
        let b = now_timestamp();
        assert!(a > 0.0);
        assert!(b >= a);
    }
}
