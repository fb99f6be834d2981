//! Compiled units.
//!
//! A unit is the compiler service's output for one complete piece of
//! source. The engine treats the code as opaque bytes: it caches them,
//! hands them to the executor, and never looks inside.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a piece of source is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompileMode {
    /// One interactive statement, typed at the prompt.
    Single,
    /// A whole script.
    Exec,
}

impl CompileMode {
    /// Short lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Exec => "exec",
        }
    }
}

impl fmt::Display for CompileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executable code paired with the exact source it came from.
///
/// Immutable once produced.
///
/// # Examples
///
/// ```
/// use incsh::core::{CompileMode, CompiledUnit};
///
/// let unit = CompiledUnit::new("echo hi\n", CompileMode::Single, "<stdin>", vec![1, 2, 3]);
/// assert_eq!(unit.source(), "echo hi\n");
/// assert_eq!(unit.code(), &[1, 2, 3]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledUnit {
    source: String,
    mode: CompileMode,
    filename: String,
    code: Vec<u8>,
}

impl CompiledUnit {
    /// Creates a unit.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        mode: CompileMode,
        filename: impl Into<String>,
        code: Vec<u8>,
    ) -> Self {
        Self {
            source: source.into(),
            mode,
            filename: filename.into(),
            code,
        }
    }

    /// The source text the unit was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The mode it was compiled in.
    #[must_use]
    pub const fn mode(&self) -> CompileMode {
        self.mode
    }

    /// Name used in diagnostics (`<stdin>` for interactive input).
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The compiled code.
    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code
    }
}
