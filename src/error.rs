//! Error types for incsh operations.
//!
//! This module provides the error hierarchy using `thiserror` for the
//! compiler seam, the code cache, the output tee, history storage, and the
//! CLI. Executor faults are carried separately in [`ExecError`] because they
//! are recorded in history rather than propagated.

use thiserror::Error;

/// Result type alias for incsh operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Compilation failed permanently.
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    /// Code cache errors (only surfaced by explicit cache maintenance).
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Output tee errors.
    #[error("tee error: {0}")]
    Tee(#[from] TeeError),

    /// History storage errors.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O errors (file and stream operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Invalid state errors.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Errors reported by a compiler service.
///
/// `Incomplete` is a control signal for the input buffer, not a failure:
/// the incremental compiler decides whether it means "keep reading" or
/// "give up" from the shape of the source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The source ended before a statement was complete.
    #[error("incomplete input: {message}")]
    Incomplete {
        /// What the compiler was still waiting for.
        message: String,
    },

    /// The source is not valid.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// Description of the problem.
        message: String,
        /// One-based line number.
        line: usize,
        /// One-based column number.
        column: usize,
    },

    /// Any other compiler failure.
    #[error("{0}")]
    Other(String),
}

impl CompileError {
    /// Returns `true` for the "source ended too early" kind.
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete { .. })
    }
}

/// Cache-specific errors.
///
/// Lookups never surface these; they degrade to a miss. They show up from
/// store and maintenance operations and in debug logs.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Reading or writing a cache artifact failed.
    #[error("cache I/O error at {path}: {reason}")]
    Io {
        /// The artifact path.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// Artifact header is missing or malformed.
    #[error("invalid artifact header: {reason}")]
    InvalidHeader {
        /// Description of the header problem.
        reason: String,
    },

    /// Artifact format version does not match.
    #[error("version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version this build writes.
        expected: u32,
        /// Version found in the artifact.
        actual: u32,
    },

    /// Entry was produced under a different fingerprint.
    #[error("stale entry: fingerprint {actual} does not match {expected}")]
    Stale {
        /// Fingerprint required now.
        expected: String,
        /// Fingerprint recorded at store time.
        actual: String,
    },

    /// Payload checksum does not match the header.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Checksum recorded in the header.
        expected: String,
        /// Checksum of the payload read back.
        actual: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Output tee errors.
#[derive(Error, Debug)]
pub enum TeeError {
    /// A tee is already installed on the streams.
    #[error("a tee is already open on these streams")]
    AlreadyOpen,

    /// Encoding name is not supported.
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),

    /// Encoding error policy is not supported.
    #[error("unknown encoding error policy: {0}")]
    UnknownErrorPolicy(String),

    /// Bytes could not be decoded under the `strict` policy.
    #[error("cannot decode byte 0x{byte:02x} at offset {offset} as {encoding}")]
    Decode {
        /// Encoding in use.
        encoding: &'static str,
        /// Offending byte.
        byte: u8,
        /// Offset into the payload.
        offset: usize,
    },

    /// Writing to a real stream failed.
    #[error("stream write failed: {0}")]
    Write(String),
}

/// History storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// History database not initialized.
    #[error("history database not initialized")]
    NotInitialized,

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    /// The executed input finished with a non-zero return code.
    #[error("exited with status {0}")]
    Exit(i32),
}

/// Failure raised while executing a compiled unit.
///
/// `Shell` errors are expected, user-facing failures whose message is shown
/// as-is. Everything else is a `Fault` and gets a full diagnostic.
#[derive(Error, Debug)]
pub enum ExecError {
    /// Recognized shell-level error.
    #[error("{0}")]
    Shell(String),

    /// Unrecognized fault.
    #[error(transparent)]
    Fault(#[from] anyhow::Error),
}

impl ExecError {
    /// Creates a shell-level error.
    pub fn shell(message: impl Into<String>) -> Self {
        Self::Shell(message.into())
    }
}

// Implement From traits for standard library and dependency errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for CacheError {
    fn from(err: bincode::error::EncodeError) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for CacheError {
    fn from(err: bincode::error::DecodeError) -> Self {
        Self::Serialization(err.to_string())
    }
}
