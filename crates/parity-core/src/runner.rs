//! Execution adapter: run one command to completion and capture its output.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

use crate::error::ExecError;

/// A command to run: an executable plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable path (or name resolved through `PATH`).
    pub program: PathBuf,

    /// Arguments passed verbatim.
    pub args: Vec<OsString>,
}

impl Invocation {
    /// An invocation with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Program path rendered for logs and reports.
    pub fn display_program(&self) -> String {
        self.program.display().to_string()
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Immutable record of one process run.
///
/// The captured bytes are never decoded here; text rendering belongs to the
/// report sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit code, or -1 when the process was terminated by a signal.
    pub exit_code: i32,

    /// Captured stdout bytes.
    pub stdout: Vec<u8>,

    /// Captured stderr bytes.
    pub stderr: Vec<u8>,

    /// Wall-clock duration in milliseconds. Not part of any comparison.
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Build a result from raw parts, with a zero duration.
    pub fn new(exit_code: i32, stdout: impl Into<Vec<u8>>, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration_ms: 0,
        }
    }
}

/// Kills a child's whole process group when dropped.
///
/// Children are spawned as process group leaders, so the group id is the
/// child's pid and covers every descendant that did not leave the group.
struct ProcessGroup {
    pgid: Option<i32>,
    killed: AtomicBool,
}

impl ProcessGroup {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.map(|p| p as i32),
            killed: AtomicBool::new(false),
        }
    }

    /// SIGKILL every process left in the group. Runs at most once; a pgid
    /// must not be signalled after it may have been recycled.
    fn kill(&self) {
        if self.killed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(pgid) = self.pgid {
            kill_group(pgid);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: i32) {
    // SAFETY: killpg has no memory-safety preconditions. ESRCH (group
    // already gone) is expected and ignored.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
        debug!(pgid, "killed process group");
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: i32) {}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Runs child processes with piped output and a mandatory timeout.
pub struct ExecRunner;

impl ExecRunner {
    /// Run `invocation` to completion, capturing exit code, stdout and stderr.
    ///
    /// Both pipes are drained while waiting for the child, so large outputs
    /// cannot deadlock or be truncated. The child runs in its own process
    /// group. Once it exits, any descendants still in the group are killed so
    /// they cannot hold the pipes open. When `timeout` elapses, or the
    /// returned future is dropped, the whole group is killed; a timeout
    /// yields `ProcessTimeout`.
    pub async fn run(
        invocation: &Invocation,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecError> {
        let start = Instant::now();
        let program = invocation.display_program();

        debug!(command = %invocation, "spawning process");

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| ExecError::LaunchFailure {
            program: program.clone(),
            source,
        })?;
        let group = ProcessGroup::new(child.id());
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let collect = async {
            let (status, stdout, stderr) = tokio::join!(
                async {
                    let status = child.wait().await;
                    group.kill();
                    status
                },
                drain(stdout),
                drain(stderr),
            );
            Ok::<_, std::io::Error>((status?, stdout?, stderr?))
        };

        let (status, stdout, stderr) = tokio::time::timeout(timeout, collect)
            .await
            .map_err(|_| ExecError::ProcessTimeout {
                program: program.clone(),
                limit_ms: timeout.as_millis() as u64,
            })?
            .map_err(|source| ExecError::LaunchFailure {
                program: program.clone(),
                source,
            })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = status.code().unwrap_or(-1);

        debug!(
            program = %program,
            exit_code,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            duration_ms,
            "process finished"
        );

        Ok(ExecutionResult {
            exit_code,
            stdout,
            stderr,
            duration_ms,
        })
    }
}
