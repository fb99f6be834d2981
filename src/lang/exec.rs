//! Executor for the built-in command language.

use std::path::PathBuf;

use anyhow::Context as _;

use crate::core::{CompiledUnit, RTN_FAILURE, RTN_SUCCESS, Value};
use crate::error::ExecError;
use crate::lang::decode_program;
use crate::lang::parser::{Part, Stmt, Target, Word};
use crate::session::{Executor, Runtime};
use crate::tee::StreamId;

/// Runs programs produced by [`crate::lang::BuiltinCompiler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinExecutor;

impl Executor for BuiltinExecutor {
    fn execute(&mut self, unit: &CompiledUnit, rt: &mut Runtime<'_>) -> Result<(), ExecError> {
        let program = decode_program(unit.code())
            .with_context(|| format!("loading compiled unit from {}", unit.filename()))?;
        run_block(&program.stmts, rt)
    }
}

fn run_block(stmts: &[Stmt], rt: &mut Runtime<'_>) -> Result<(), ExecError> {
    for stmt in stmts {
        if rt.status.exit_requested {
            break;
        }
        run_stmt(stmt, rt)?;
    }
    Ok(())
}

fn run_stmt(stmt: &Stmt, rt: &mut Runtime<'_>) -> Result<(), ExecError> {
    match stmt {
        Stmt::Echo { target, words } => {
            let mut line = join(words, rt);
            line.push('\n');
            let id = match target {
                Target::Stdout => StreamId::Stdout,
                Target::Stderr => StreamId::Stderr,
            };
            rt.io
                .write(id, line.as_bytes())
                .with_context(|| format!("writing to {id}"))?;
        }
        Stmt::Set { name, words } => {
            let text = join(words, rt);
            let value = text
                .parse::<i64>()
                .map_or_else(|_| Value::String(text), Value::Integer);
            rt.vars.set_variable(name.clone(), value);
        }
        Stmt::Unset(name) => {
            rt.vars.remove_variable(name);
        }
        Stmt::Cd(dir) => change_dir(dir.as_ref(), rt)?,
        Stmt::True => {}
        Stmt::False => rt.status.return_code = Some(RTN_FAILURE),
        Stmt::Exit(code) => {
            rt.status.return_code = Some(code.unwrap_or(RTN_SUCCESS));
            rt.status.exit_requested = true;
        }
        Stmt::Fail(words) => return Err(ExecError::shell(join(words, rt))),
        Stmt::Abort(words) => return Err(anyhow::anyhow!("{}", join(words, rt)).into()),
        Stmt::Repeat { count, body } => {
            for _ in 0..*count {
                if rt.status.exit_requested {
                    break;
                }
                run_block(body, rt)?;
            }
        }
    }
    Ok(())
}

fn change_dir(dir: Option<&Word>, rt: &mut Runtime<'_>) -> Result<(), ExecError> {
    let target = match dir {
        Some(word) => expand(word, rt),
        None => rt
            .env
            .get("HOME")
            .map(str::to_string)
            .ok_or_else(|| ExecError::shell("cd: HOME not set"))?,
    };

    let mut path = PathBuf::from(&target);
    if path.is_relative() {
        let base = rt.cwd.current().context("reading current directory")?;
        path = base.join(path);
    }
    if !path.is_dir() {
        return Err(ExecError::shell(format!("cd: no such directory: {target}")));
    }
    rt.cwd
        .change(&path)
        .map_err(|e| ExecError::shell(format!("cd: {target}: {e}")))
}

/// Expands one word against the context, then the environment.
fn expand(word: &Word, rt: &Runtime<'_>) -> String {
    let mut out = String::new();
    for part in &word.0 {
        match part {
            Part::Lit(s) => out.push_str(s),
            Part::Var(name) => {
                if let Some(value) = rt.vars.get_variable(name) {
                    out.push_str(&value.to_string());
                } else if let Some(value) = rt.env.get(name) {
                    out.push_str(value);
                }
            }
        }
    }
    out
}

fn join(words: &[Word], rt: &Runtime<'_>) -> String {
    words
        .iter()
        .map(|w| expand(w, rt))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompilerService, STDIN_FILENAME};
    use crate::core::{CommandStatus, CompileMode, Context, Env};
    use crate::lang::BuiltinCompiler;
    use crate::session::VirtualDir;
    use crate::tee::{SharedBuffer, StdStreams};

    struct Harness {
        vars: Context,
        io: StdStreams,
        out: SharedBuffer,
        err: SharedBuffer,
        status: CommandStatus,
        env: Env,
        cwd: VirtualDir,
    }

    impl Harness {
        fn new() -> Self {
            let (io, out, err) = StdStreams::buffered();
            Self {
                vars: Context::new(),
                io,
                out,
                err,
                status: CommandStatus::default(),
                env: Env::new(),
                cwd: VirtualDir::new(std::env::temp_dir()),
            }
        }

        fn run(&mut self, source: &str) -> Result<(), ExecError> {
            let unit = BuiltinCompiler::new()
                .compile(source, CompileMode::Exec, STDIN_FILENAME, &self.vars)
                .unwrap();
            let mut rt = Runtime {
                vars: &mut self.vars,
                io: &mut self.io,
                status: &mut self.status,
                env: &self.env,
                cwd: &mut self.cwd,
            };
            BuiltinExecutor.execute(&unit, &mut rt)
        }
    }

    #[test]
    fn test_echo_targets() {
        let mut h = Harness::new();
        h.run("echo out\nechoerr err\n").unwrap();
        assert_eq!(h.out.to_string_lossy(), "out\n");
        assert_eq!(h.err.to_string_lossy(), "err\n");
        assert_eq!(h.status.return_code, None);
    }

    #[test]
    fn test_variables_expand_from_context_then_env() {
        let mut h = Harness::new();
        h.env.set("WHO", "env");
        h.env.set("ONLY_ENV", "yes");
        h.run("echo $WHO $ONLY_ENV\nset WHO ctx\necho $WHO $MISSING.\n")
            .unwrap();
        assert_eq!(h.out.to_string_lossy(), "env yes\nctx .\n");
    }

    #[test]
    fn test_set_parses_integers() {
        let mut h = Harness::new();
        h.run("set n 42\nset s forty two\n").unwrap();
        assert_eq!(h.vars.get_variable("n"), Some(&Value::Integer(42)));
        assert_eq!(h.vars.get_variable("s"), Some(&Value::from("forty two")));

        h.run("unset n\n").unwrap();
        assert!(h.vars.get_variable("n").is_none());
    }

    #[test]
    fn test_false_and_exit_set_status() {
        let mut h = Harness::new();
        h.run("false\n").unwrap();
        assert_eq!(h.status.return_code, Some(RTN_FAILURE));

        let mut h = Harness::new();
        h.run("exit 4\necho unreachable\n").unwrap();
        assert_eq!(h.status.return_code, Some(4));
        assert!(h.status.exit_requested);
        assert!(h.out.is_empty());
    }

    #[test]
    fn test_fail_and_abort_errors() {
        let mut h = Harness::new();
        let err = h.run("echo before\nfail no such thing\necho after\n").unwrap_err();
        assert!(matches!(err, ExecError::Shell(ref m) if m == "no such thing"));
        assert_eq!(h.out.to_string_lossy(), "before\n");

        let err = h.run("abort boom\n").unwrap_err();
        assert!(matches!(err, ExecError::Fault(_)));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_repeat_runs_body() {
        let mut h = Harness::new();
        h.run("repeat 3:\n  echo x\n").unwrap();
        assert_eq!(h.out.to_string_lossy(), "x\nx\nx\n");
    }

    #[test]
    fn test_cd_changes_virtual_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let mut h = Harness::new();
        h.cwd = VirtualDir::new(dir.path());
        h.run("cd sub\n").unwrap();
        assert_eq!(h.cwd.path(), dir.path().join("sub"));

        let err = h.run("cd missing\n").unwrap_err();
        assert!(matches!(err, ExecError::Shell(ref m) if m.contains("no such directory")));
    }

    #[test]
    fn test_corrupt_unit_is_fault() {
        let mut h = Harness::new();
        let unit = CompiledUnit::new("x\n", CompileMode::Single, "<stdin>", vec![0xff; 3]);
        let mut rt = Runtime {
            vars: &mut h.vars,
            io: &mut h.io,
            status: &mut h.status,
            env: &h.env,
            cwd: &mut h.cwd,
        };
        assert!(matches!(
            BuiltinExecutor.execute(&unit, &mut rt),
            Err(ExecError::Fault(_))
        ));
    }
}
