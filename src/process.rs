//
// ──────────────────────────────────────────────────────────────────────────────
//  COMMAND EXECUTION
// ──────────────────────────────────────────────────────────────────────────────
//
// External processes are reached only through the `CommandRunner` trait, so
// the pipeline can be exercised with canned output and no real spawns.
//
// `SystemCommandRunner` is the real implementation:
//   1. stdin is closed and git prompts are disabled, so nothing can block on
//      the terminal.
//   2. stdout and stderr are drained on dedicated threads, so a child that
//      fills its pipe buffer cannot deadlock against our wait loop.
//   3. the wait loop polls for exit, the timeout, and host cancellation; on
//      timeout or cancellation the child is killed and reaped.
//   4. a descendant can inherit the pipes and outlive the child, so the
//      readers are only waited on until the command's deadline (plus a short
//      grace after a kill) and are then abandoned.
//

use std::{
    io::{self, Read},
    process::{Child, Command, ExitStatus, Stdio},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    thread,
    time::{Duration, Instant},
};

use snafu::prelude::*;
use tracing::debug;

/// Default per-command ceiling.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long pipes may stay open once the child is gone.
const PIPE_GRACE: Duration = Duration::from_millis(100);

type PipeResult = io::Result<Vec<u8>>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CommandError {
    #[snafu(display("executable `{program}` was not found"))]
    NotFound { program: String },

    #[snafu(display("failed to spawn `{program}`"))]
    Spawn { program: String, source: io::Error },

    #[snafu(display("`{program}` exited with {status}"))]
    Failed { program: String, status: ExitStatus },

    #[snafu(display("`{program}` did not finish within {timeout:?}"))]
    TimedOut { program: String, timeout: Duration },

    #[snafu(display("`{program}` was cancelled"))]
    Cancelled { program: String },

    #[snafu(display("I/O error while running `{program}`"))]
    Io { program: String, source: io::Error },
}

impl CommandError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Shared cancellation flag handed out by the host.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One external invocation: program, arguments and a time ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `program arg arg`, for logs and fakes.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs a command and returns its trimmed standard output.
pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec, cancel: &CancellationToken) -> Result<String, CommandError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, spec: &CommandSpec, cancel: &CancellationToken) -> Result<String, CommandError> {
        (**self).run(spec, cancel)
    }
}

/// Spawns real processes.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner {
    working_dir: Option<std::path::PathBuf>,
}

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every command from `dir` instead of the current directory.
    pub fn in_dir(dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
        }
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, spec: &CommandSpec, cancel: &CancellationToken) -> Result<String, CommandError> {
        let program = spec.program.clone();
        if cancel.is_cancelled() {
            return CancelledSnafu { program }.fail();
        }

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        debug!(command = %spec.command_line(), timeout = ?spec.timeout, "spawning");

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return NotFoundSnafu { program }.fail();
            }
            Err(source) => return Err(CommandError::Spawn { program, source }),
        };

        let stdout = child.stdout.take().map(spawn_pipe_reader);
        let stderr = child.stderr.take().map(spawn_pipe_reader);

        let started = Instant::now();
        let waited = wait_with_timeout(&mut child, spec.timeout, cancel, &program);

        // The child is reaped, but anything it spawned may still hold the
        // pipes open. Never wait past the command's own deadline.
        let grace = Instant::now() + PIPE_GRACE;
        let deadline = match &waited {
            Ok(_) => (started + spec.timeout).max(grace),
            Err(_) => grace,
        };
        let stdout = collect_pipe(stdout, deadline);
        let stderr = collect_pipe(stderr, deadline);

        let status = waited?;
        let Some(stdout) = stdout else {
            debug!(command = %spec.command_line(), "stdout still open after exit, abandoning reader");
            return TimedOutSnafu {
                program,
                timeout: spec.timeout,
            }
            .fail();
        };
        let stdout = stdout.context(IoSnafu { program: program.clone() })?;
        if !status.success() {
            if let Some(Ok(stderr)) = stderr {
                debug!(
                    command = %spec.command_line(),
                    stderr = %String::from_utf8_lossy(&stderr).trim(),
                    "command failed"
                );
            }
            return FailedSnafu { program, status }.fail();
        }

        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }
}

/// Drain `pipe` on its own thread. The thread is detached; if nobody is
/// listening when it finishes, the send simply fails.
fn spawn_pipe_reader(mut pipe: impl Read + Send + 'static) -> mpsc::Receiver<PipeResult> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let result = pipe.read_to_end(&mut buffer).map(|_| buffer);
        let _ = tx.send(result);
    });
    rx
}

/// `None` when the pipe was still open at `deadline`.
fn collect_pipe(reader: Option<mpsc::Receiver<PipeResult>>, deadline: Instant) -> Option<PipeResult> {
    let Some(reader) = reader else {
        return Some(Ok(Vec::new()));
    };
    match reader.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(result) => Some(result),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(Err(io::Error::other("pipe reader thread panicked"))),
    }
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
    cancel: &CancellationToken,
    program: &str,
) -> Result<ExitStatus, CommandError> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().context(IoSnafu { program })? {
            return Ok(status);
        }

        if cancel.is_cancelled() {
            kill(child, program)?;
            return CancelledSnafu { program }.fail();
        }

        if start.elapsed() >= timeout {
            // It may have exited between the poll and now.
            if let Some(status) = child.try_wait().context(IoSnafu { program })? {
                return Ok(status);
            }
            kill(child, program)?;
            return TimedOutSnafu { program, timeout }.fail();
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn kill(child: &mut Child, program: &str) -> Result<(), CommandError> {
    // Already-exited children report InvalidInput; reaping below still works.
    let _ = child.kill();
    child.wait().context(IoSnafu { program })?;
    Ok(())
}
