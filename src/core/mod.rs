//! Core domain models for incsh.
//!
//! The data the engine moves around: the variable context, the environment,
//! compiled units, and history records. Pure data with no I/O.

pub mod context;
pub mod env;
pub mod history;
pub mod unit;

pub use context::{Context, Value};
pub use env::{Env, LAST_RETURN_CODE, OLDPWD, PWD};
pub use history::{
    CommandStatus, HistoryRecord, RTN_FAILURE, RTN_SUCCESS, merge_output, now_timestamp,
};
pub use unit::{CompileMode, CompiledUnit};
