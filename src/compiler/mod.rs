//! Compilation seam and the incremental input buffer.
//!
//! A [`CompilerService`] turns complete source into a [`CompiledUnit`]. The
//! [`IncrementalCompiler`] sits in front of it, accumulating input lines
//! until they form a complete unit and consulting the code cache first.

pub mod incremental;
pub mod lexer;

pub use incremental::{CompileState, IncrementalCompiler, Pushed};
pub use lexer::{StringSpan, find_partial_string, in_partial_string};

use crate::core::{CompileMode, CompiledUnit, Context};
use crate::error::CompileError;

/// Name given to units compiled from interactive input.
pub const STDIN_FILENAME: &str = "<stdin>";

/// Trait for source-language compilers.
pub trait CompilerService {
    /// Compiles `source` in `mode`.
    ///
    /// `filename` is recorded on the unit for diagnostics. The context is
    /// the live variable namespace the unit will run against.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Incomplete`] when the source stops before a
    /// statement is complete, and another variant when it can never be
    /// valid.
    fn compile(
        &self,
        source: &str,
        mode: CompileMode,
        filename: &str,
        ctx: &Context,
    ) -> Result<CompiledUnit, CompileError>;

    /// Identifies this compiler build. Cached units produced under a
    /// different fingerprint are never reused.
    fn fingerprint(&self) -> String;
}

/// Pure rewrite applied to accumulated source before compiling.
pub trait SourceTransform {
    /// Returns the rewritten source.
    fn transform(&self, source: &str) -> String;
}

impl<F> SourceTransform for F
where
    F: Fn(&str) -> String,
{
    fn transform(&self, source: &str) -> String {
        self(source)
    }
}

/// Transform that leaves the source alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl SourceTransform for Identity {
    fn transform(&self, source: &str) -> String {
        source.to_string()
    }
}
