//! The incremental compiler: a line-buffering state machine.
//!
//! Lines are pushed one at a time. While the accumulated source is an
//! incomplete statement, lines keep buffering; once the source compiles (or
//! is rejected for good) the buffer is cleared and the machine is idle
//! again.
//!
//! An incomplete source is given up on only when the user has ended it
//! with a blank line and it is not inside an open string literal. Until
//! then, "incomplete" means "keep reading".

use std::path::Path;

use crate::cache::{CodeCache, Fingerprint};
use crate::compiler::lexer::in_partial_string;
use crate::compiler::{CompilerService, Identity, STDIN_FILENAME, SourceTransform};
use crate::core::{CompileMode, CompiledUnit, Context};
use crate::error::CompileError;

/// Outcome of a compile attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileState {
    /// The source is incomplete; the buffer is kept.
    AwaitingMore,
    /// The source compiled; the buffer was cleared.
    Ready(CompiledUnit),
    /// The source can never compile; the buffer was cleared.
    Rejected(CompileError),
}

/// Result of pushing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pushed {
    /// The accumulated source after transformation.
    pub source: String,
    /// What happened to it.
    pub state: CompileState,
}

/// Accumulates input lines and compiles them once complete.
pub struct IncrementalCompiler<C> {
    service: C,
    cache: CodeCache,
    transform: Box<dyn SourceTransform>,
    buffer: Vec<String>,
    need_more: bool,
}

impl<C: std::fmt::Debug> std::fmt::Debug for IncrementalCompiler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalCompiler")
            .field("service", &self.service)
            .field("cache", &self.cache)
            .field("buffer", &self.buffer)
            .field("need_more", &self.need_more)
            .finish_non_exhaustive()
    }
}

impl<C: CompilerService> IncrementalCompiler<C> {
    /// Creates an idle compiler.
    pub fn new(service: C, cache: CodeCache) -> Self {
        Self {
            service,
            cache,
            transform: Box::new(Identity),
            buffer: Vec::new(),
            need_more: false,
        }
    }

    /// Sets the transform applied before compiling.
    #[must_use]
    pub fn with_transform(mut self, transform: impl SourceTransform + 'static) -> Self {
        self.transform = Box::new(transform);
        self
    }

    /// The wrapped compiler service.
    pub const fn service(&self) -> &C {
        &self.service
    }

    /// The code cache.
    pub const fn cache(&self) -> &CodeCache {
        &self.cache
    }

    /// Returns `true` while lines are buffered awaiting completion.
    #[must_use]
    pub fn is_accumulating(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Lines buffered so far.
    #[must_use]
    pub fn buffered_lines(&self) -> &[String] {
        &self.buffer
    }

    /// Discards buffered input.
    pub fn reset(&mut self) {
        if !self.buffer.is_empty() {
            tracing::debug!(lines = self.buffer.len(), "input buffer reset");
        }
        self.buffer.clear();
        self.need_more = false;
    }

    /// Pushes one line of input.
    ///
    /// A missing trailing newline is added. Once a push has reported
    /// [`CompileState::AwaitingMore`], further pushes only buffer; the next
    /// compile attempt happens on [`IncrementalCompiler::empty_line`].
    pub fn push(&mut self, line: &str, ctx: &Context) -> Pushed {
        let mut line = line.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        self.buffer.push(line);

        if self.need_more {
            return Pushed {
                source: self.buffer.concat(),
                state: CompileState::AwaitingMore,
            };
        }

        let source = self.transform.transform(&self.buffer.concat());
        let state = self.compile(&source, ctx);
        Pushed { source, state }
    }

    /// Handles a blank line: clears the need-more flag, then pushes an
    /// empty line, which forces a compile attempt.
    pub fn empty_line(&mut self, ctx: &Context) -> Pushed {
        self.need_more = false;
        self.push("\n", ctx)
    }

    /// Compiles `source` as interactive input, via the cache when enabled.
    pub fn compile(&mut self, source: &str, ctx: &Context) -> CompileState {
        let mode = CompileMode::Single;
        let use_cache = self.cache.should_use_cache(mode);
        let fingerprint = Fingerprint::interactive(&self.service.fingerprint());

        if use_cache && let Some(unit) = self.cache.lookup(source, &fingerprint) {
            self.reset();
            return CompileState::Ready(unit);
        }

        match self.service.compile(source, mode, STDIN_FILENAME, ctx) {
            Ok(unit) => {
                if use_cache && let Err(e) = self.cache.store(source, &unit, &fingerprint) {
                    tracing::warn!(error = %e, "failed to cache compiled unit");
                }
                self.reset();
                CompileState::Ready(unit)
            }
            Err(err) if err.is_incomplete() => {
                let ended = source == "\n" || source.ends_with("\n\n");
                if ended && !in_partial_string(source) {
                    tracing::debug!(error = %err, "incomplete input ended by blank line");
                    self.reset();
                    CompileState::Rejected(err)
                } else {
                    self.need_more = true;
                    CompileState::AwaitingMore
                }
            }
            Err(err) => {
                self.reset();
                CompileState::Rejected(err)
            }
        }
    }

    /// Compiles a whole script file in `Exec` mode.
    ///
    /// Bypasses the line buffer. The cache entry is tied to the file's
    /// modification time, so editing the script invalidates it.
    ///
    /// # Errors
    ///
    /// Returns the compiler's error, including `Incomplete` for a script
    /// that ends mid-statement.
    pub fn compile_file(
        &mut self,
        path: &Path,
        source: &str,
        ctx: &Context,
    ) -> Result<CompiledUnit, CompileError> {
        let mode = CompileMode::Exec;
        let mut source = source.to_string();
        if !source.ends_with('\n') {
            source.push('\n');
        }
        let fingerprint = if self.cache.should_use_cache(mode) {
            Fingerprint::for_file(&self.service.fingerprint(), path)
        } else {
            None
        };

        if let Some(fp) = &fingerprint
            && let Some(unit) = self.cache.lookup(&source, fp)
        {
            return Ok(unit);
        }

        let filename = path.display().to_string();
        let unit = self.service.compile(&source, mode, &filename, ctx)?;
        if let Some(fp) = &fingerprint
            && let Err(e) = self.cache.store(&source, &unit, fp)
        {
            tracing::warn!(error = %e, path = %filename, "failed to cache script");
        }
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use std::cell::Cell;

    /// Accepts anything except `bad`; a source starting with `block:` is
    /// complete only once it ends with a blank line.
    #[derive(Debug, Default)]
    struct StubCompiler {
        calls: Cell<usize>,
    }

    impl CompilerService for StubCompiler {
        fn compile(
            &self,
            source: &str,
            mode: CompileMode,
            filename: &str,
            _ctx: &Context,
        ) -> Result<CompiledUnit, CompileError> {
            self.calls.set(self.calls.get() + 1);
            if source.contains("bad") {
                return Err(CompileError::Syntax {
                    message: "bad word".to_string(),
                    line: 1,
                    column: 1,
                });
            }
            let open_block = source.starts_with("block:") && !source.ends_with("\n\n");
            if open_block || in_partial_string(source) || source.trim().is_empty() {
                return Err(CompileError::Incomplete {
                    message: "more".to_string(),
                });
            }
            Ok(CompiledUnit::new(source, mode, filename, source.as_bytes().to_vec()))
        }

        fn fingerprint(&self) -> String {
            "stub-1".to_string()
        }
    }

    fn compiler(policy: CachePolicy) -> IncrementalCompiler<StubCompiler> {
        IncrementalCompiler::new(StubCompiler::default(), CodeCache::in_memory(policy))
    }

    #[test]
    fn test_single_line_is_ready() {
        let mut ic = compiler(CachePolicy::off());
        let pushed = ic.push("echo hi", &Context::new());
        assert_eq!(pushed.source, "echo hi\n");
        assert!(matches!(pushed.state, CompileState::Ready(_)));
        assert!(!ic.is_accumulating());
    }

    #[test]
    fn test_block_waits_for_blank_line() {
        let mut ic = compiler(CachePolicy::off());
        let ctx = Context::new();

        let first = ic.push("block:", &ctx);
        assert_eq!(first.state, CompileState::AwaitingMore);
        assert!(ic.is_accumulating());

        let body = ic.push("  echo x", &ctx);
        assert_eq!(body.state, CompileState::AwaitingMore);
        assert_eq!(ic.buffered_lines().len(), 2);
        assert_eq!(ic.service().calls.get(), 1);

        let done = ic.empty_line(&ctx);
        assert_eq!(done.source, "block:\n  echo x\n\n");
        assert!(matches!(done.state, CompileState::Ready(_)));
        assert!(!ic.is_accumulating());
    }

    #[test]
    fn test_blank_line_gives_up_on_incomplete() {
        let mut ic = compiler(CachePolicy::off());
        let pushed = ic.empty_line(&Context::new());
        assert_eq!(pushed.source, "\n");
        assert!(matches!(pushed.state, CompileState::Rejected(ref e) if e.is_incomplete()));
        assert!(!ic.is_accumulating());
    }

    #[test]
    fn test_blank_line_inside_string_keeps_reading() {
        let mut ic = compiler(CachePolicy::off());
        let ctx = Context::new();
        assert_eq!(ic.push("echo 'a", &ctx).state, CompileState::AwaitingMore);

        let blank = ic.empty_line(&ctx);
        assert_eq!(blank.state, CompileState::AwaitingMore);
        assert!(ic.is_accumulating());

        ic.push("b'", &ctx);
        let done = ic.empty_line(&ctx);
        assert!(matches!(done.state, CompileState::Ready(_)));
    }

    #[test]
    fn test_hash_inside_word_does_not_hide_open_string() {
        let mut ic = compiler(CachePolicy::off());
        let ctx = Context::new();
        assert_eq!(ic.push("echo a#b 'x", &ctx).state, CompileState::AwaitingMore);
        assert_eq!(ic.empty_line(&ctx).state, CompileState::AwaitingMore);
        assert!(ic.is_accumulating());
    }

    #[test]
    fn test_syntax_error_rejects_immediately() {
        let mut ic = compiler(CachePolicy::off());
        let pushed = ic.push("bad", &Context::new());
        assert!(matches!(
            pushed.state,
            CompileState::Rejected(CompileError::Syntax { .. })
        ));
        assert!(!ic.is_accumulating());
    }

    #[test]
    fn test_cache_hit_skips_service() {
        let mut ic = compiler(CachePolicy::all());
        let ctx = Context::new();
        let first = ic.push("echo hi", &ctx);
        let second = ic.push("echo hi", &ctx);
        assert_eq!(first.state, second.state);
        assert_eq!(ic.service().calls.get(), 1);
        assert_eq!(ic.cache().len(), 1);
    }

    #[test]
    fn test_rejected_source_not_cached() {
        let mut ic = compiler(CachePolicy::all());
        ic.push("bad", &Context::new());
        ic.push("bad", &Context::new());
        assert_eq!(ic.service().calls.get(), 2);
        assert!(ic.cache().is_empty());
    }

    #[test]
    fn test_transform_applied_before_compile() {
        let mut ic = compiler(CachePolicy::off()).with_transform(|s: &str| s.replace("ECHO", "echo"));
        let pushed = ic.push("ECHO hi", &Context::new());
        assert_eq!(pushed.source, "echo hi\n");
    }

    #[test]
    fn test_reset_discards_buffer() {
        let mut ic = compiler(CachePolicy::off());
        ic.push("block:", &Context::new());
        ic.reset();
        assert!(!ic.is_accumulating());
        let pushed = ic.push("echo ok", &Context::new());
        assert!(matches!(pushed.state, CompileState::Ready(_)));
    }

    #[test]
    fn test_compile_file_uses_mtime_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script");
        std::fs::write(&path, "echo one\n").unwrap();

        let mut ic = compiler(CachePolicy::default());
        let ctx = Context::new();
        let unit = ic.compile_file(&path, "echo one", &ctx).unwrap();
        assert_eq!(unit.mode(), CompileMode::Exec);
        assert_eq!(unit.filename(), path.display().to_string());

        ic.compile_file(&path, "echo one", &ctx).unwrap();
        assert_eq!(ic.service().calls.get(), 1);

        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(std::time::UNIX_EPOCH + std::time::Duration::from_secs(99))
            .unwrap();
        ic.compile_file(&path, "echo one", &ctx).unwrap();
        assert_eq!(ic.service().calls.get(), 2);
    }

    #[test]
    fn test_compile_file_reports_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script");
        std::fs::write(&path, "block:\n").unwrap();
        let mut ic = compiler(CachePolicy::off());
        let err = ic.compile_file(&path, "block:", &Context::new()).unwrap_err();
        assert!(err.is_incomplete());
    }
}
