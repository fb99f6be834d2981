//! The execution session: push, compile, execute, record.
//!
//! [`ExecutionSession::run`] takes one raw input line. Lines accumulate in
//! the incremental compiler until they form a unit; the unit then runs
//! under a [`Tee`] and produces exactly one history record, whatever the
//! executor does. Cleanup (record, tee close, working-directory check)
//! runs on success, on shell-level errors and on faults, including panics.

pub mod events;
pub mod executor;
pub mod workdir;

pub use events::{Event, EventBus, EventLog, NullEvents, TracingEvents};
pub use executor::{Executor, Runtime};
pub use workdir::{ProcessDir, VirtualDir, WorkingDir};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::compiler::{CompileState, CompilerService, IncrementalCompiler};
use crate::core::{
    CommandStatus, CompiledUnit, Context, Env, HistoryRecord, LAST_RETURN_CODE, OLDPWD, PWD,
    RTN_FAILURE, RTN_SUCCESS, merge_output, now_timestamp,
};
use crate::error::{CompileError, ExecError, Result};
use crate::storage::HistorySink;
use crate::tee::{StdStreams, StreamId, Tee, TeeConfig};

/// Which prompt the shell should show next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    /// Ready for a new statement.
    Primary,
    /// In the middle of a multi-line statement.
    Continuation,
}

impl PromptState {
    /// Default prompt text.
    #[must_use]
    pub const fn prompt(self) -> &'static str {
        match self {
            Self::Primary => "$ ",
            Self::Continuation => "... ",
        }
    }
}

/// Drives input lines through compilation, execution and history.
pub struct ExecutionSession<C, X> {
    compiler: IncrementalCompiler<C>,
    executor: X,
    streams: StdStreams,
    env: Env,
    tee_config: TeeConfig,
    events: Box<dyn EventBus>,
    history: Option<Box<dyn HistorySink>>,
    cwd: Box<dyn WorkingDir>,
    status: CommandStatus,
    last_return_code: Option<i32>,
}

impl<C, X> std::fmt::Debug for ExecutionSession<C, X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionSession")
            .field("status", &self.status)
            .field("last_return_code", &self.last_return_code)
            .field("has_history", &self.history.is_some())
            .finish_non_exhaustive()
    }
}

impl<C: CompilerService, X: Executor> ExecutionSession<C, X> {
    /// Creates a session with an empty environment, no events, no history
    /// and the process's working directory.
    pub fn new(compiler: IncrementalCompiler<C>, executor: X, streams: StdStreams) -> Self {
        Self {
            compiler,
            executor,
            streams,
            env: Env::new(),
            tee_config: TeeConfig::default(),
            events: Box::new(NullEvents),
            history: None,
            cwd: Box::new(ProcessDir),
            status: CommandStatus::default(),
            last_return_code: None,
        }
    }

    /// Sets the environment.
    #[must_use]
    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    /// Sets the tee settings.
    #[must_use]
    pub fn with_tee_config(mut self, config: TeeConfig) -> Self {
        self.tee_config = config;
        self
    }

    /// Sets the event handler.
    #[must_use]
    pub fn with_events(mut self, events: impl EventBus + 'static) -> Self {
        self.events = Box::new(events);
        self
    }

    /// Sets the history sink.
    #[must_use]
    pub fn with_history(mut self, history: impl HistorySink + 'static) -> Self {
        self.history = Some(Box::new(history));
        self
    }

    /// Sets the working-directory provider.
    #[must_use]
    pub fn with_working_dir(mut self, cwd: impl WorkingDir + 'static) -> Self {
        self.cwd = Box::new(cwd);
        self
    }

    /// The environment.
    pub const fn env(&self) -> &Env {
        &self.env
    }

    /// Mutable access to the environment.
    pub const fn env_mut(&mut self) -> &mut Env {
        &mut self.env
    }

    /// The incremental compiler.
    pub const fn compiler(&self) -> &IncrementalCompiler<C> {
        &self.compiler
    }

    /// Mutable access to the incremental compiler.
    pub const fn compiler_mut(&mut self) -> &mut IncrementalCompiler<C> {
        &mut self.compiler
    }

    /// The standard streams.
    pub const fn streams(&self) -> &StdStreams {
        &self.streams
    }

    /// Per-command status.
    pub const fn status(&self) -> &CommandStatus {
        &self.status
    }

    /// Return code of the last executed unit.
    pub const fn last_return_code(&self) -> Option<i32> {
        self.last_return_code
    }

    /// Which prompt to show for the next line.
    #[must_use]
    pub fn prompt_state(&self) -> PromptState {
        if self.compiler.is_accumulating() {
            PromptState::Continuation
        } else {
            PromptState::Primary
        }
    }

    /// Discards partially entered input.
    pub fn interrupt(&mut self) {
        self.compiler.reset();
    }

    /// Feeds one input line.
    ///
    /// Returns `true` when an executed statement asked the shell to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the tee can't be opened or the history sink
    /// fails. Execution failures are not errors: they are reported on
    /// stderr and recorded.
    pub fn run(&mut self, line: &str, ctx: &mut Context) -> Result<bool> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        let accumulating = self.compiler.is_accumulating();

        let pushed = if accumulating {
            if line.is_empty() {
                self.compiler.empty_line(ctx)
            } else {
                self.compiler.push(line, ctx)
            }
        } else if line.trim().is_empty() {
            return Ok(false);
        } else {
            self.compiler.push(line.trim_start(), ctx)
        };

        match pushed.state {
            CompileState::AwaitingMore => Ok(false),
            CompileState::Rejected(err) => {
                self.report_rejection(&err);
                Ok(false)
            }
            CompileState::Ready(unit) => self.execute(&unit, ctx),
        }
    }

    /// Executes a compiled unit and records it.
    ///
    /// Returns `true` when the unit asked the shell to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the tee can't be opened or the history sink
    /// fails. A sink failure is reported only after cleanup has run.
    pub fn execute(&mut self, unit: &CompiledUnit, ctx: &mut Context) -> Result<bool> {
        let inp = unit.source().to_string();
        self.status.exit_requested = false;
        self.events.on_precommand(&inp);

        let mut tee = Tee::open(&mut self.streams, self.tee_config.clone())?;
        let ts0 = now_timestamp();

        let outcome = {
            let mut rt = Runtime {
                vars: ctx,
                io: tee.streams(),
                status: &mut self.status,
                env: &self.env,
                cwd: self.cwd.as_mut(),
            };
            let executor = &mut self.executor;
            panic::catch_unwind(AssertUnwindSafe(|| executor.execute(unit, &mut rt)))
        };

        match outcome {
            Ok(Ok(())) => self.status.default_return_code(RTN_SUCCESS),
            Ok(Err(ExecError::Shell(message))) => {
                report(&mut tee, &format!("{message}\n"));
                self.status.default_return_code(RTN_FAILURE);
            }
            Ok(Err(ExecError::Fault(err))) => {
                tracing::debug!(error = ?err, "unit raised a fault");
                report(&mut tee, &format!("error: {err:?}\n"));
                self.status.default_return_code(RTN_FAILURE);
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::debug!(panic = %message, "unit panicked");
                report(&mut tee, &format!("panic: {message}\n"));
                self.status.default_return_code(RTN_FAILURE);
            }
        }

        let ts1 = now_timestamp();
        let tee_out = tee.captured_text();
        tee.close();
        drop(tee);

        let appended = self.append_history(inp, [ts0, ts1], tee_out);
        self.fix_cwd();
        appended?;
        Ok(self.status.exit_requested)
    }

    fn report_rejection(&mut self, err: &CompileError) {
        if let Err(e) = self.streams.write(StreamId::Stderr, format!("{err}\n").as_bytes()) {
            tracing::warn!(error = %e, "failed to report compile error");
        }
    }

    fn append_history(&mut self, inp: String, ts: [f64; 2], tee_out: String) -> Result<()> {
        let rtn = self.status.return_code;
        self.last_return_code = rtn;
        self.env
            .set(LAST_RETURN_CODE, rtn.unwrap_or(RTN_SUCCESS).to_string());

        let out = merge_output(Some(tee_out), self.status.output.take());
        let record = HistoryRecord { inp, ts, rtn, out };
        self.events
            .on_postcommand(&record.inp, record.rtn, record.out.as_deref(), record.ts);

        let result = match self.history.as_mut() {
            Some(sink) => sink.append(&record).inspect_err(|e| {
                tracing::warn!(error = %e, "failed to append history record");
            }),
            None => Ok(()),
        };
        self.status.clear_command();
        result
    }

    /// Syncs `PWD`/`OLDPWD` with the real working directory.
    fn fix_cwd(&mut self) {
        let cwd = match self.cwd.current() {
            Ok(path) => path.display().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read working directory");
                return;
            }
        };
        let old = self.env.get(PWD).map(str::to_string);
        if old.as_deref() == Some(cwd.as_str()) {
            return;
        }
        if let Some(old) = &old {
            self.env.set(OLDPWD, old.as_str());
        }
        self.env.set(PWD, cwd.as_str());
        self.events.on_chdir(old.as_deref(), &cwd);
    }
}

fn report(tee: &mut Tee<'_>, message: &str) {
    if let Err(e) = tee.write(StreamId::Stderr, message.as_bytes()) {
        tracing::warn!(error = %e, "failed to write execution error");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachePolicy, CodeCache};
    use crate::error::{Error, StorageError};
    use crate::lang::{BuiltinCompiler, BuiltinExecutor};
    use crate::storage::MemoryHistory;
    use crate::tee::SharedBuffer;

    struct Fixture {
        session: ExecutionSession<BuiltinCompiler, BuiltinExecutor>,
        ctx: Context,
        history: MemoryHistory,
        events: EventLog,
        cwd: VirtualDir,
        out: SharedBuffer,
        err: SharedBuffer,
    }

    fn fixture() -> Fixture {
        let (streams, out, err) = StdStreams::buffered();
        let history = MemoryHistory::new();
        let events = EventLog::new();
        let cwd = VirtualDir::new("/home/user");
        let env: Env = [(PWD, "/home/user")].into_iter().collect();
        let compiler = IncrementalCompiler::new(BuiltinCompiler::new(), CodeCache::disabled());
        let session = ExecutionSession::new(compiler, BuiltinExecutor, streams)
            .with_env(env)
            .with_history(history.clone())
            .with_events(events.clone())
            .with_working_dir(cwd.clone());
        Fixture {
            session,
            ctx: Context::new(),
            history,
            events,
            cwd,
            out,
            err,
        }
    }

    #[test]
    fn test_single_line_records_history() {
        let mut f = fixture();
        assert!(!f.session.run("echo hi", &mut f.ctx).unwrap());

        let records = f.history.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].inp, "echo hi\n");
        assert_eq!(records[0].rtn, Some(0));
        assert_eq!(records[0].out.as_deref(), Some("hi\n"));
        assert!(records[0].ts[1] >= records[0].ts[0]);
        assert_eq!(f.out.to_string_lossy(), "hi\n");
        assert_eq!(f.session.status(), &CommandStatus::default());
        assert_eq!(f.session.env().get(LAST_RETURN_CODE), Some("0"));
    }

    #[test]
    fn test_leading_whitespace_stripped_at_prompt() {
        let mut f = fixture();
        f.session.run("   echo hi\n", &mut f.ctx).unwrap();
        assert_eq!(f.history.records()[0].inp, "echo hi\n");
    }

    #[test]
    fn test_multiline_block() {
        let mut f = fixture();
        f.session.run("repeat 2:", &mut f.ctx).unwrap();
        assert_eq!(f.session.prompt_state(), PromptState::Continuation);
        f.session.run("    echo x", &mut f.ctx).unwrap();
        assert!(f.history.records().is_empty());

        f.session.run("", &mut f.ctx).unwrap();
        assert_eq!(f.session.prompt_state(), PromptState::Primary);
        let records = f.history.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].inp, "repeat 2:\n    echo x\n\n");
        assert_eq!(records[0].out.as_deref(), Some("x\nx\n"));
    }

    #[test]
    fn test_whitespace_line_is_kept_while_accumulating() {
        let mut f = fixture();
        for line in ["echo 'a", "   ", "b'"] {
            f.session.run(line, &mut f.ctx).unwrap();
        }
        assert!(f.history.records().is_empty());

        f.session.run("", &mut f.ctx).unwrap();
        let records = f.history.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].inp, "echo 'a\n   \nb'\n\n");
        assert_eq!(f.out.to_string_lossy(), "a\n   \nb\n");
    }

    #[test]
    fn test_indented_blank_line_does_not_close_block() {
        let mut f = fixture();
        for line in ["repeat 2:", "    echo x", "    ", "    echo y"] {
            f.session.run(line, &mut f.ctx).unwrap();
        }
        assert_eq!(f.session.prompt_state(), PromptState::Continuation);

        f.session.run("", &mut f.ctx).unwrap();
        let records = f.history.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].out.as_deref(), Some("x\ny\nx\ny\n"));
    }

    #[test]
    fn test_blank_line_at_prompt_is_noop() {
        let mut f = fixture();
        assert!(!f.session.run("   ", &mut f.ctx).unwrap());
        assert!(f.history.records().is_empty());
        assert!(f.events.events().is_empty());
    }

    #[test]
    fn test_syntax_error_reported_not_recorded() {
        let mut f = fixture();
        f.session.run("frobnicate now", &mut f.ctx).unwrap();
        assert!(f.history.records().is_empty());
        assert!(f.err.to_string_lossy().contains("unknown command: frobnicate"));
        assert_eq!(f.session.streams().tees_opened(), 0);
    }

    #[test]
    fn test_shell_error_sets_rtn_and_captures_message() {
        let mut f = fixture();
        f.session.run("fail disk full", &mut f.ctx).unwrap();
        let record = &f.history.records()[0];
        assert_eq!(record.rtn, Some(RTN_FAILURE));
        assert_eq!(record.out.as_deref(), Some("disk full\n"));
        assert_eq!(f.err.to_string_lossy(), "disk full\n");
    }

    #[test]
    fn test_fault_records_trace() {
        let mut f = fixture();
        f.session.run("abort kaboom", &mut f.ctx).unwrap();
        let record = &f.history.records()[0];
        assert_eq!(record.rtn, Some(RTN_FAILURE));
        assert!(record.out.as_deref().is_some_and(|o| o.contains("kaboom")));
        assert_eq!(f.session.streams().tees_closed(), 1);
    }

    #[test]
    fn test_unit_return_code_wins() {
        let mut f = fixture();
        let exit = f.session.run("exit 7", &mut f.ctx).unwrap();
        assert!(exit);
        assert_eq!(f.history.records()[0].rtn, Some(7));
        assert_eq!(f.session.last_return_code(), Some(7));

        assert!(!f.session.run("echo again", &mut f.ctx).unwrap());
        assert_eq!(f.history.records()[1].out.as_deref(), Some("again\n"));
    }

    #[test]
    fn test_events_in_order() {
        let mut f = fixture();
        f.session.run("echo hi", &mut f.ctx).unwrap();
        let events = f.events.events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            Event::Precommand {
                source: "echo hi\n".to_string()
            }
        );
        assert!(matches!(
            &events[1],
            Event::Postcommand { rtn: Some(0), out: Some(out), .. } if out == "hi\n"
        ));
    }

    #[test]
    fn test_cwd_drift_updates_env() {
        let mut f = fixture();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().display().to_string();

        f.session.run(&format!("cd '{target}'"), &mut f.ctx).unwrap();
        assert_eq!(f.cwd.path(), dir.path());
        assert_eq!(f.session.env().get(PWD), Some(target.as_str()));
        assert_eq!(f.session.env().get(OLDPWD), Some("/home/user"));
        assert!(f.events.events().contains(&Event::Chdir {
            old: Some("/home/user".to_string()),
            new: target,
        }));
    }

    #[test]
    fn test_first_chdir_has_no_old() {
        let (streams, _out, _err) = StdStreams::buffered();
        let events = EventLog::new();
        let compiler = IncrementalCompiler::new(BuiltinCompiler::new(), CodeCache::disabled());
        let mut session = ExecutionSession::new(compiler, BuiltinExecutor, streams)
            .with_events(events.clone())
            .with_working_dir(VirtualDir::new("/srv"));
        session.run("true", &mut Context::new()).unwrap();

        assert!(session.env().get(OLDPWD).is_none());
        assert!(events.events().contains(&Event::Chdir {
            old: None,
            new: "/srv".to_string(),
        }));
    }

    #[test]
    fn test_interrupt_discards_partial_input() {
        let mut f = fixture();
        f.session.run("echo 'unterminated", &mut f.ctx).unwrap();
        assert_eq!(f.session.prompt_state(), PromptState::Continuation);
        f.session.interrupt();
        assert_eq!(f.session.prompt_state(), PromptState::Primary);
    }

    #[test]
    fn test_context_persists_between_runs() {
        let mut f = fixture();
        f.session.run("set name world", &mut f.ctx).unwrap();
        f.session.run("echo hello $name", &mut f.ctx).unwrap();
        assert_eq!(f.out.to_string_lossy(), "hello world\n");
    }

    #[test]
    fn test_cache_reused_across_runs() {
        let (streams, _out, _err) = StdStreams::buffered();
        let compiler =
            IncrementalCompiler::new(BuiltinCompiler::new(), CodeCache::in_memory(CachePolicy::all()));
        let mut session = ExecutionSession::new(compiler, BuiltinExecutor, streams)
            .with_working_dir(VirtualDir::new("/"));
        let mut ctx = Context::new();
        session.run("echo a", &mut ctx).unwrap();
        session.run("echo a", &mut ctx).unwrap();
        assert_eq!(session.compiler().cache().len(), 1);
    }

    struct Panicker;

    impl Executor for Panicker {
        fn execute(&mut self, _unit: &CompiledUnit, rt: &mut Runtime<'_>) -> std::result::Result<(), ExecError> {
            rt.io.write(StreamId::Stdout, b"partial").unwrap();
            panic!("executor blew up");
        }
    }

    #[test]
    fn test_panic_is_contained() {
        let (streams, out, err) = StdStreams::buffered();
        let history = MemoryHistory::new();
        let compiler = IncrementalCompiler::new(BuiltinCompiler::new(), CodeCache::disabled());
        let mut session = ExecutionSession::new(compiler, Panicker, streams)
            .with_history(history.clone())
            .with_working_dir(VirtualDir::new("/"));

        assert!(!session.run("echo x", &mut Context::new()).unwrap());
        let record = &history.records()[0];
        assert_eq!(record.rtn, Some(RTN_FAILURE));
        assert_eq!(
            record.out.as_deref(),
            Some("partialpanic: executor blew up\n")
        );
        assert_eq!(out.to_string_lossy(), "partial");
        assert!(err.to_string_lossy().contains("executor blew up"));
        assert_eq!(
            (session.streams().tees_opened(), session.streams().tees_closed()),
            (1, 1)
        );
        assert!(!session.streams().is_teed());
    }

    struct BrokenSink;

    impl HistorySink for BrokenSink {
        fn append(&mut self, _record: &HistoryRecord) -> Result<()> {
            Err(StorageError::Database("disk gone".to_string()).into())
        }
    }

    #[test]
    fn test_sink_failure_after_cleanup() {
        let (streams, _out, _err) = StdStreams::buffered();
        let events = EventLog::new();
        let compiler = IncrementalCompiler::new(BuiltinCompiler::new(), CodeCache::disabled());
        let mut session = ExecutionSession::new(compiler, BuiltinExecutor, streams)
            .with_history(BrokenSink)
            .with_events(events.clone())
            .with_working_dir(VirtualDir::new("/tmp"));

        let err = session.run("echo hi", &mut Context::new()).unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::Database(_))));
        assert!(!session.streams().is_teed());
        assert_eq!(session.env().get(PWD), Some("/tmp"));
        assert_eq!(session.status(), &CommandStatus::default());
        assert!(
            events
                .events()
                .iter()
                .any(|e| matches!(e, Event::Postcommand { .. }))
        );
    }

    #[test]
    fn test_external_output_merged_after_tee() {
        struct External;

        impl Executor for External {
            fn execute(
                &mut self,
                _unit: &CompiledUnit,
                rt: &mut Runtime<'_>,
            ) -> std::result::Result<(), ExecError> {
                rt.io.write(StreamId::Stdout, b"teed").unwrap();
                rt.status.output = Some("external".to_string());
                Ok(())
            }
        }

        let (streams, _out, _err) = StdStreams::buffered();
        let history = MemoryHistory::new();
        let compiler = IncrementalCompiler::new(BuiltinCompiler::new(), CodeCache::disabled());
        let mut session = ExecutionSession::new(compiler, External, streams)
            .with_history(history.clone())
            .with_working_dir(VirtualDir::new("/"));
        session.run("true", &mut Context::new()).unwrap();
        assert_eq!(history.records()[0].out.as_deref(), Some("teed\nexternal"));
    }
}
