//! Executor seam.

use crate::core::{CommandStatus, CompiledUnit, Context, Env};
use crate::error::ExecError;
use crate::session::workdir::WorkingDir;
use crate::tee::StdStreams;

/// What an executing unit can reach.
///
/// Everything is lent for the duration of one execution.
pub struct Runtime<'a> {
    /// Live variable namespace.
    pub vars: &'a mut Context,
    /// Standard streams; teed while a unit runs under a session.
    pub io: &'a mut StdStreams,
    /// Pending return code, external output and exit request.
    pub status: &'a mut CommandStatus,
    /// Shell environment.
    pub env: &'a Env,
    /// Working directory.
    pub cwd: &'a mut dyn WorkingDir,
}

/// Trait for executing compiled units.
pub trait Executor {
    /// Runs `unit`.
    ///
    /// The executor may set `rt.status.return_code` itself; the session
    /// only fills it in when left unset.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Shell`] for expected, user-facing failures and
    /// [`ExecError::Fault`] for anything else.
    fn execute(&mut self, unit: &CompiledUnit, rt: &mut Runtime<'_>) -> Result<(), ExecError>;
}
