//! Supervised child processes.
//!
//! Every tool runs in its own process group with piped output. Lines are
//! forwarded to the `log` facade as they arrive and the last
//! [`TAIL_LINES`] are kept for error reports. Cancellation is polled;
//! once requested, the whole group receives SIGTERM, then SIGKILL after a
//! grace period.

use std::collections::VecDeque;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{BuildError, Result};
use crate::toolchain;

/// Output lines kept for failure diagnostics.
pub const TAIL_LINES: usize = 40;

const POLL: Duration = Duration::from_millis(50);
const TERM_GRACE: Duration = Duration::from_secs(3);

/// Shared cancellation flag for one operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A command line to run in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// How a finished command exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    /// Last lines of combined stdout and stderr.
    pub tail: Vec<String>,
}

impl CommandOutput {
    /// Turn an unsuccessful exit into [`BuildError::BuildFailure`].
    pub fn check(self, command: &CommandSpec) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(BuildError::BuildFailure {
                step: command.to_string(),
                exit_code: self.exit_code,
                tail: self.tail,
            })
        }
    }

    /// The tail joined into one diagnostic string.
    pub fn diagnostic(&self) -> String {
        self.tail.join("\n")
    }
}

/// Runs external commands. Swapped for a scripted runner in tests.
pub trait CommandRunner: Send + Sync {
    /// Fail with [`BuildError::ToolchainNotFound`] unless `tool` can be run.
    fn require(&self, tool: &str) -> Result<()>;

    /// Run to completion, or until `cancel` fires ([`BuildError::Cancelled`]).
    fn run(&self, command: &CommandSpec, cancel: &CancelToken) -> Result<CommandOutput>;
}

/// Runs real processes found on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn require(&self, tool: &str) -> Result<()> {
        toolchain::require(tool).map(|_| ())
    }

    fn run(&self, command: &CommandSpec, cancel: &CancelToken) -> Result<CommandOutput> {
        let program = toolchain::require(&command.program)?;
        log::debug!("running {command} in {}", command.cwd.display());

        let mut cmd = Command::new(&program);
        cmd.args(&command.args)
            .current_dir(&command.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let mut child = cmd.spawn().map_err(|source| BuildError::Spawn {
            program: command.program.clone(),
            source,
        })?;

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(pump(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(pump(stderr, tx.clone()));
        }
        drop(tx);

        let mut tail = VecDeque::with_capacity(TAIL_LINES);
        let result = supervise(&mut child, &rx, cancel, &command.program, &mut tail);
        for reader in readers {
            let _ = reader.join();
        }
        // Lines that raced the exit.
        for line in rx.try_iter() {
            record(&command.program, line, &mut tail);
        }

        let status = result?;
        Ok(CommandOutput {
            success: status.success(),
            exit_code: status.code(),
            tail: tail.into_iter().collect(),
        })
    }
}

fn pump<R: Read + Send + 'static>(stream: R, tx: mpsc::Sender<String>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

fn record(program: &str, line: String, tail: &mut VecDeque<String>) {
    log::info!("[{program}] {line}");
    if tail.len() == TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(line);
}

fn supervise(
    child: &mut Child,
    rx: &mpsc::Receiver<String>,
    cancel: &CancelToken,
    program: &str,
    tail: &mut VecDeque<String>,
) -> Result<std::process::ExitStatus> {
    loop {
        if cancel.is_cancelled() {
            terminate(child);
            return Err(BuildError::Cancelled);
        }
        match rx.recv_timeout(POLL) {
            Ok(line) => record(program, line, tail),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    // Both streams are closed; the process may still be running.
    loop {
        if let Some(status) = child.try_wait().map_err(|source| BuildError::Spawn {
            program: program.to_string(),
            source,
        })? {
            return Ok(status);
        }
        if cancel.is_cancelled() {
            terminate(child);
            return Err(BuildError::Cancelled);
        }
        thread::sleep(POLL);
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    log::info!("terminating process group {pgid}");
    // SAFETY: `pgid` is the group created for this child by `process_group(0)`.
    if unsafe { libc::killpg(pgid, libc::SIGTERM) } != 0 {
        let _ = child.kill();
    }
    let deadline = Instant::now() + TERM_GRACE;
    while Instant::now() < deadline {
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        thread::sleep(POLL);
    }
    log::warn!("process group {pgid} ignored SIGTERM; killing");
    // SAFETY: as above.
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
    let _ = child.wait();
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
