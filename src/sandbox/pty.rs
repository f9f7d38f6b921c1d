//! Pseudo-terminal backed execution of generated programs
//!
//! The artifact is written to a fixed path and run by an interpreter whose
//! stdout and stderr both point at the slave side of a fresh pty. The parent
//! drains the master side, so the captured text keeps the interleaving a
//! human would see at a terminal.
//!
//! ```text
//!  ┌────────────┐  write   ┌───────────┐  read 512B  ┌──────────────┐
//!  │ interpreter│ ───────→ │ pty slave │ ──────────→ │ master (host)│
//!  │ stdout+err │          └───────────┘   chunks    └──────────────┘
//!  └────────────┘
//! ```
//!
//! The child runs in its own process group. When the deadline expires the
//! whole group is killed. Reading stops shortly after the interpreter is
//! gone, even if a descendant that left the group still holds the slave.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::pty::{openpty, OpenptyResult};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::unix::AsyncFd;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::metrics::{CODE_EXECUTIONS, CODE_EXECUTION_DURATION};

/// Fixed artifact name, left on disk after the session for re-running
pub const DEFAULT_ARTIFACT_PATH: &str = "temp_code_to_execute.py";

/// Substrings that mark captured output as a failed run
pub const ERROR_SIGNATURES: [&str; 2] = ["Error:", "Traceback"];

/// How long to keep reading once the interpreter is gone
const EXIT_GRACE: Duration = Duration::from_millis(200);

/// Configuration for the sandboxed executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Where the artifact is written before every run
    pub artifact_path: PathBuf,
    /// Interpreter invoked as `<interpreter> <artifact_path>`
    pub interpreter: String,
    /// Deadline for a single run, after which the process group is killed
    pub timeout: Duration,
    /// Size of each read from the pty master
    pub chunk_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            interpreter: "python3".to_string(),
            timeout: Duration::from_secs(60),
            chunk_size: 512,
        }
    }
}

/// How the repair loop should read a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No error signature in the output
    Clean,
    /// Output contains `Error:` or `Traceback`
    ErrorSignature,
    /// The deadline expired and the process group was killed
    TimedOut,
    /// The artifact could not be written or the interpreter not started
    Failed,
}

impl Verdict {
    pub fn is_failure(self) -> bool {
        self != Verdict::Clean
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Clean => "clean",
            Verdict::ErrorSignature => "error_signature",
            Verdict::TimedOut => "timed_out",
            Verdict::Failed => "failed",
        }
    }
}

/// Captured result of one execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Combined stdout/stderr as read from the pty
    pub output: String,
    /// Real exit code, when the process exited normally
    pub exit_code: Option<i32>,
    /// Whether the deadline expired
    pub timed_out: bool,
    /// Orchestration failure (write, spawn, wait), with empty output
    pub error: Option<String>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: f64,
}

impl ExecutionResult {
    fn failed(error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Textual error detection over the captured output
    pub fn has_error_signature(&self) -> bool {
        has_error_signature(&self.output)
    }

    /// Secondary signal: the process exited with a non-zero code
    pub fn exited_nonzero(&self) -> bool {
        matches!(self.exit_code, Some(code) if code != 0)
    }

    /// Failure kind, checked in order: orchestration error, timeout, signature
    pub fn verdict(&self) -> Verdict {
        if self.error.is_some() {
            Verdict::Failed
        } else if self.timed_out {
            Verdict::TimedOut
        } else if self.has_error_signature() {
            Verdict::ErrorSignature
        } else {
            Verdict::Clean
        }
    }

    /// Text describing what went wrong, for revision and diagnostic requests
    pub fn error_text(&self) -> Option<String> {
        match self.verdict() {
            Verdict::Clean => None,
            Verdict::ErrorSignature => Some(self.output.clone()),
            Verdict::TimedOut => Some(format!(
                "Execution timed out after {:.0}ms. Partial output:\n{}",
                self.duration_ms, self.output
            )),
            Verdict::Failed => self.error.clone(),
        }
    }
}

/// True when `output` contains any of the error signatures
pub fn has_error_signature(output: &str) -> bool {
    ERROR_SIGNATURES.iter().any(|sig| output.contains(sig))
}

/// Runs generated source files behind a pseudo-terminal
#[derive(Debug, Clone, Default)]
pub struct PtyExecutor {
    config: ExecutorConfig,
}

impl PtyExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn artifact_path(&self) -> &Path {
        &self.config.artifact_path
    }

    /// Persist `source`, run it, and capture everything it prints.
    ///
    /// Never returns an error: orchestration failures come back as an empty
    /// output with `error` set, so the caller always reaches a decision point.
    pub async fn execute(&self, source: &str) -> ExecutionResult {
        let start = Instant::now();

        if let Err(e) = tokio::fs::write(&self.config.artifact_path, source).await {
            warn!(path = %self.config.artifact_path.display(), error = %e, "Failed to write artifact");
            let result = ExecutionResult::failed(format!(
                "Failed to write {}: {}",
                self.config.artifact_path.display(),
                e
            ));
            record(&result);
            return result;
        }

        let mut result = match self.run_artifact().await {
            Ok(result) => result,
            Err(e) => {
                warn!(interpreter = %self.config.interpreter, error = %e, "Execution failed to start");
                ExecutionResult::failed(format!(
                    "Failed to run {} {}: {}",
                    self.config.interpreter,
                    self.config.artifact_path.display(),
                    e
                ))
            }
        };
        result.duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        if result.exited_nonzero() && !result.has_error_signature() {
            warn!(
                exit_code = ?result.exit_code,
                "Process exited non-zero without an error signature in its output"
            );
        }
        info!(
            verdict = result.verdict().as_str(),
            exit_code = ?result.exit_code,
            duration_ms = result.duration_ms,
            output_len = result.output.len(),
            "Execution finished"
        );
        record(&result);
        result
    }

    async fn run_artifact(&self) -> io::Result<ExecutionResult> {
        let OpenptyResult { master, slave } = openpty(None, None).map_err(io::Error::from)?;
        for fd in [master.as_raw_fd(), slave.as_raw_fd()] {
            fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(io::Error::from)?;
        }
        fcntl(master.as_raw_fd(), FcntlArg::F_SETFL(OFlag::O_NONBLOCK)).map_err(io::Error::from)?;
        let master = AsyncFd::new(File::from(master))?;

        // The command holds the parent's copies of the slave; drop it right
        // after spawning so the master sees end-of-stream once the child exits.
        let mut child = {
            let mut cmd = std::process::Command::new(&self.config.interpreter);
            cmd.arg(&self.config.artifact_path)
                .stdin(Stdio::null())
                .stdout(Stdio::from(slave.try_clone()?))
                .stderr(Stdio::from(slave))
                .process_group(0);
            Command::from(cmd).spawn()?
        };
        let pid = child.id();
        debug!(?pid, interpreter = %self.config.interpreter, "Spawned interpreter");

        let chunk_size = self.config.chunk_size.max(1);
        let mut output = Vec::new();
        let (status, timed_out) = {
            let reading = read_until_closed(&master, chunk_size, &mut output);
            tokio::pin!(reading);

            let finished = tokio::time::timeout(self.config.timeout, async {
                let exited = tokio::select! {
                    _ = &mut reading => None,
                    status = child.wait() => Some(status),
                };
                match exited {
                    Some(status) => {
                        // A detached descendant can hold the slave open forever
                        let _ = tokio::time::timeout(EXIT_GRACE, &mut reading).await;
                        status
                    }
                    None => child.wait().await,
                }
            })
            .await;

            match finished {
                Ok(status) => (status, false),
                Err(_) => {
                    warn!(?pid, timeout = ?self.config.timeout, "Execution deadline expired, killing process group");
                    if let Some(pid) = pid {
                        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                            warn!(pid, error = %e, "Failed to kill process group");
                        }
                    }
                    let status = child.wait().await;
                    // Collect what is still buffered, but never wait on processes
                    // that escaped the group
                    let _ = tokio::time::timeout(EXIT_GRACE, &mut reading).await;
                    (status, true)
                }
            }
        };

        Ok(ExecutionResult {
            output: String::from_utf8_lossy(&output).into_owned(),
            exit_code: status.ok().as_ref().and_then(ExitStatus::code),
            timed_out,
            error: None,
            duration_ms: 0.0,
        })
    }
}

/// Read fixed-size chunks until end-of-stream or a read error.
///
/// On Linux the master reports EIO once every slave handle is closed, so an
/// error is the normal way this loop ends. Bytes are appended as they arrive,
/// so dropping the future keeps everything read so far.
async fn read_until_closed(master: &AsyncFd<File>, chunk_size: usize, output: &mut Vec<u8>) {
    let mut chunk = vec![0u8; chunk_size];
    loop {
        let mut guard = match master.readable().await {
            Ok(guard) => guard,
            Err(_) => break,
        };
        match guard.try_io(|fd| {
            let mut file: &File = fd.get_ref();
            file.read(&mut chunk)
        }) {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => output.extend_from_slice(&chunk[..n]),
            Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
            Ok(Err(_)) => break,
            Err(_would_block) => continue,
        }
    }
}

fn record(result: &ExecutionResult) {
    CODE_EXECUTIONS
        .with_label_values(&[result.verdict().as_str()])
        .inc();
    CODE_EXECUTION_DURATION.observe(result.duration_ms / 1000.0);
}
