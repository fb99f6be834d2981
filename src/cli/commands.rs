//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use crate::cache::{CacheStore, CodeCache, DiskStore};
use crate::cli::output::{
    OutputFormat, StatusReport, format_history, format_status,
};
use crate::cli::parser::{CacheCommands, Cli, Commands, HistoryCommands};
use crate::compiler::{CompilerService, IncrementalCompiler};
use crate::config::ShellConfig;
use crate::core::{Context, Env, RTN_SUCCESS};
use crate::error::{CommandError, IoError, Result, StorageError};
use crate::lang::{BuiltinCompiler, BuiltinExecutor};
use crate::session::{ExecutionSession, Executor, TracingEvents};
use crate::storage::{HistoryStore, SqliteHistory};
use crate::tee::StdStreams;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

/// Session type driven by the binary.
pub type BuiltinSession = ExecutionSession<BuiltinCompiler, BuiltinExecutor>;

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute. A non-zero return
/// code from executed input is reported as [`CommandError::Exit`].
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();

    match &cli.command {
        Commands::Repl => cmd_repl(cli),
        Commands::Run { file } => cmd_run(cli, file),
        Commands::History(history_cmd) => match history_cmd {
            HistoryCommands::List { limit } => cmd_history_list(&db_path, None, *limit, format),
            HistoryCommands::Search { needle, limit } => {
                cmd_history_list(&db_path, Some(needle), *limit, format)
            }
            HistoryCommands::Clear { yes } => cmd_history_clear(&db_path, *yes),
        },
        Commands::Cache(CacheCommands::Clear) => cmd_cache_clear(&cli.get_cache_dir()),
        Commands::Status => cmd_status(cli, format),
    }
}

/// Opens the history database and ensures it's initialized.
fn open_history(db_path: &Path) -> Result<SqliteHistory> {
    if !db_path.exists() {
        return Err(StorageError::NotInitialized.into());
    }

    let history = SqliteHistory::open(db_path)?;
    if !history.is_initialized()? {
        return Err(StorageError::NotInitialized.into());
    }

    Ok(history)
}

/// Builds a session on the process's streams and environment.
///
/// `history` is attached as the session's sink when given.
pub fn build_session(
    env: Env,
    cache_dir: &Path,
    history: Option<SqliteHistory>,
) -> Result<BuiltinSession> {
    let config = ShellConfig::from_env(&env)?;
    tracing::debug!(
        encoding = config.encoding.name(),
        errors = config.errors.name(),
        cache_dir = %cache_dir.display(),
        "building session"
    );

    let cache = CodeCache::new(config.cache, Box::new(DiskStore::new(cache_dir)));
    let compiler = IncrementalCompiler::new(BuiltinCompiler::new(), cache);
    let streams = StdStreams::process(config.sink_kind());

    let session = ExecutionSession::new(compiler, BuiltinExecutor, streams)
        .with_env(env)
        .with_tee_config(config.tee_config())
        .with_events(TracingEvents);

    Ok(match history {
        Some(history) => session.with_history(history),
        None => session,
    })
}

/// Feeds lines from `input` to the session until EOF or an exit request.
///
/// Prompts go to `prompts` when given. Returns the return code of the last
/// executed unit, zero if nothing ran.
///
/// # Errors
///
/// Returns an error if reading input fails or the session fails.
pub fn drive<C: CompilerService, X: Executor>(
    session: &mut ExecutionSession<C, X>,
    ctx: &mut Context,
    mut input: impl BufRead,
    mut prompts: Option<&mut dyn Write>,
) -> Result<i32> {
    let mut line = String::new();
    loop {
        if let Some(out) = prompts.as_deref_mut() {
            write!(out, "{}", session.prompt_state().prompt())?;
            out.flush()?;
        }

        line.clear();
        if input.read_line(&mut line)? == 0 {
            // Flush a pending block as if the user had ended it.
            if session.compiler().is_accumulating() {
                session.run("", ctx)?;
            }
            break;
        }

        if session.run(&line, ctx)? {
            tracing::debug!("exit requested");
            break;
        }
    }
    Ok(session.last_return_code().unwrap_or(RTN_SUCCESS))
}

fn exit_status(code: i32) -> Result<String> {
    if code == RTN_SUCCESS {
        Ok(String::new())
    } else {
        Err(CommandError::Exit(code).into())
    }
}

// ==================== Command Implementations ====================

fn cmd_repl(cli: &Cli) -> Result<String> {
    let history = if cli.no_history {
        None
    } else {
        let mut history = SqliteHistory::open(cli.get_db_path())?;
        history.init()?;
        Some(history)
    };

    let mut session = build_session(Env::from_process(), &cli.get_cache_dir(), history)?;
    let mut ctx = Context::new();

    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    let mut stdout = io::stdout();
    let prompts: Option<&mut dyn Write> = if interactive {
        Some(&mut stdout)
    } else {
        None
    };

    let code = drive(&mut session, &mut ctx, stdin.lock(), prompts)?;
    exit_status(code)
}

fn cmd_run(cli: &Cli, file: &Path) -> Result<String> {
    let source = std::fs::read_to_string(file).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            IoError::FileNotFound {
                path: file.display().to_string(),
            }
        } else {
            IoError::ReadFailed {
                path: file.display().to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    let mut session = build_session(Env::from_process(), &cli.get_cache_dir(), None)?;
    let mut ctx = Context::new();
    let unit = session.compiler_mut().compile_file(file, &source, &ctx)?;
    session.execute(&unit, &mut ctx)?;

    exit_status(session.last_return_code().unwrap_or(RTN_SUCCESS))
}

fn cmd_history_list(
    db_path: &Path,
    needle: Option<&str>,
    limit: usize,
    format: OutputFormat,
) -> Result<String> {
    let history = open_history(db_path)?;
    let records = match needle {
        Some(needle) => history.search(needle, limit)?,
        None => history.list(limit)?,
    };
    Ok(format_history(&records, format))
}

fn cmd_history_clear(db_path: &Path, yes: bool) -> Result<String> {
    if !yes {
        return Err(CommandError::ExecutionFailed(
            "Use --yes to confirm. This will delete all history.".to_string(),
        )
        .into());
    }

    let mut history = open_history(db_path)?;
    let deleted = history.clear()?;
    Ok(format!("Deleted {deleted} history records.\n"))
}

fn cmd_cache_clear(cache_dir: &Path) -> Result<String> {
    let mut store = DiskStore::new(cache_dir);
    let removed = store.clear()?;
    Ok(format!("Removed {removed} cached units.\n"))
}

fn cmd_status(cli: &Cli, format: OutputFormat) -> Result<String> {
    let db_path = cli.get_db_path();
    let cache_dir = cli.get_cache_dir();
    let config = ShellConfig::from_env(&Env::from_process())?;

    let history = match open_history(&db_path) {
        Ok(history) => Some(history.stats()?),
        Err(crate::Error::Storage(StorageError::NotInitialized)) => None,
        Err(e) => return Err(e),
    };

    let report = StatusReport {
        db_path,
        history,
        cache_entries: DiskStore::new(&cache_dir).len(),
        cache_dir,
        encoding: config.encoding.name().to_string(),
        errors: config.errors.name().to_string(),
        cache_everything: config.cache.cache_everything,
        cache_scripts: config.cache.cache_scripts,
    };
    Ok(format_status(&report, format))
}
