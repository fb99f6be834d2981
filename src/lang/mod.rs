//! Built-in command language.
//!
//! A deliberately small line-oriented language that plugs into the
//! compiler and executor seams:
//!
//! ```text
//! set name world
//! echo hello $name          # stdout
//! echoerr "careful\tnow"    # stderr
//! repeat 2:
//!     echo again
//!
//! cd /tmp
//! exit 3
//! ```
//!
//! Words may be bare, `'single'` or `"double"` quoted; strings may span
//! lines and a trailing `\` continues a line. `$NAME` expands from the
//! context first, then the environment. `fail MSG` raises a shell-level
//! error and `abort MSG` an unrecognized fault.

pub mod exec;
pub mod parser;

pub use exec::BuiltinExecutor;
pub use parser::{Part, Program, Stmt, Target, Word, parse};

use crate::cache::artifact::DECODE_LIMIT;
use crate::compiler::CompilerService;
use crate::core::{CompileMode, CompiledUnit, Context};
use crate::error::{CacheError, CompileError};

/// Revision of the compiled program format. Bump when [`Stmt`] changes.
const PROGRAM_REVISION: u32 = 1;

/// Compiler for the built-in language.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCompiler;

impl BuiltinCompiler {
    /// Creates the compiler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CompilerService for BuiltinCompiler {
    fn compile(
        &self,
        source: &str,
        mode: CompileMode,
        filename: &str,
        _ctx: &Context,
    ) -> Result<CompiledUnit, CompileError> {
        let program = parse(source, mode)?;
        let code = encode_program(&program).map_err(|e| CompileError::Other(e.to_string()))?;
        Ok(CompiledUnit::new(source, mode, filename, code))
    }

    fn fingerprint(&self) -> String {
        format!(
            "incsh-lang/{}/r{PROGRAM_REVISION}",
            env!("CARGO_PKG_VERSION")
        )
    }
}

/// Serializes a program into unit code.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_program(program: &Program) -> Result<Vec<u8>, CacheError> {
    Ok(bincode::serde::encode_to_vec(
        program,
        bincode::config::standard(),
    )?)
}

/// Deserializes unit code back into a program.
///
/// # Errors
///
/// Returns an error if the bytes are not a valid program.
pub fn decode_program(code: &[u8]) -> Result<Program, CacheError> {
    let config = bincode::config::standard().with_limit::<DECODE_LIMIT>();
    let (program, _) = bincode::serde::decode_from_slice(code, config)?;
    Ok(program)
}
