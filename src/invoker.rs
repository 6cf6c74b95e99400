//! External command invocation.
//!
//! The collector never spawns processes directly; it goes through a
//! [`CommandInvoker`] so tests can substitute a deterministic stand-in.
//! [`SystemInvoker`] is the production implementation and enforces a
//! deadline on the child process.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Exit code reported when the process never exited on its own
/// (spawn failure, killed by a signal, timed out).
pub const NO_EXIT_CODE: i32 = -1;

/// Default deadline for a single command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Interval between `try_wait` polls while the child is running.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Minimum wait for the pipe readers after the child exited.
const DRAIN_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code}: {}", .stderr.lines().next().unwrap_or_default())]
    ExitCode {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("{program} was terminated by a signal")]
    Signaled { program: String },

    #[error("{program} did not finish within {}s and was killed", .timeout.as_secs_f64())]
    Timeout { program: String, timeout: Duration },

    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl InvokeError {
    /// Exit code exported for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            InvokeError::ExitCode { code, .. } => *code,
            _ => NO_EXIT_CODE,
        }
    }
}

/// Runs an external command and returns its standard output.
///
/// A successful invocation has exit code 0; failures carry their exit code
/// via [`InvokeError::exit_code`]. Implementations must be reentrant, the
/// collector may be scraped concurrently.
pub trait CommandInvoker: Send + Sync {
    fn invoke(&self, program: &str, args: &[&str]) -> Result<Vec<u8>, InvokeError>;
}

/// Any `Fn(program, args) -> Result` works as an invoker.
impl<F> CommandInvoker for F
where
    F: Fn(&str, &[&str]) -> Result<Vec<u8>, InvokeError> + Send + Sync,
{
    fn invoke(&self, program: &str, args: &[&str]) -> Result<Vec<u8>, InvokeError> {
        self(program, args)
    }
}

/// Exit code of an invocation result.
pub fn exit_code_of<T>(result: &Result<T, InvokeError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.exit_code(),
    }
}

/// Spawns real OS processes, killing them once the deadline passes.
#[derive(Debug, Clone)]
pub struct SystemInvoker {
    timeout: Duration,
}

impl Default for SystemInvoker {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl SystemInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn timeout_error(&self, program: &str) -> InvokeError {
        InvokeError::Timeout {
            program: program.to_string(),
            timeout: self.timeout,
        }
    }

    /// Polls the child until it exits or the deadline passes.
    fn wait_until(
        &self,
        program: &str,
        child: &mut Child,
        deadline: Instant,
    ) -> Result<ExitStatus, InvokeError> {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!(
                            "{} still running after {:.1}s, killing it",
                            program,
                            self.timeout.as_secs_f64()
                        );
                        kill_process_group(child);
                        return Err(self.timeout_error(program));
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(source) => {
                    kill_process_group(child);
                    return Err(InvokeError::Wait {
                        program: program.to_string(),
                        source,
                    });
                }
            }
        }
    }
}

impl CommandInvoker for SystemInvoker {
    fn invoke(&self, program: &str, args: &[&str]) -> Result<Vec<u8>, InvokeError> {
        debug!("Running {} {}", program, args.join(" "));

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group, so a timeout also reaches backend helpers
        // (rclone, ssh) that inherited the pipes.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let deadline = Instant::now() + self.timeout;
        let mut child = command.spawn().map_err(|source| InvokeError::Spawn {
            program: program.to_string(),
            source,
        })?;

        // Pipes are drained concurrently, otherwise a large listing fills the
        // pipe buffer and the child never exits.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait_until(program, &mut child, deadline)?;

        // A descendant may still hold the pipes after the child exited.
        let (stdout, stderr) = match (
            receive_drain(&stdout, deadline),
            receive_drain(&stderr, deadline),
        ) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                warn!("{} left processes holding its output open, killing them", program);
                kill_process_group(&mut child);
                return Err(self.timeout_error(program));
            }
        };

        if status.success() {
            return Ok(stdout);
        }

        match status.code() {
            Some(code) => Err(InvokeError::ExitCode {
                program: program.to_string(),
                code,
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            }),
            None => Err(InvokeError::Signaled {
                program: program.to_string(),
            }),
        }
    }
}

/// Kills the child and everything left in its process group, then reaps it.
fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Ok(pid) = i32::try_from(child.id()) {
            if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                debug!("killpg({}) failed: {}", pid, e);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
    }
    rx
}

/// Output of a pipe reader, or `None` if the pipe is still open at the deadline.
fn receive_drain(rx: &Receiver<Vec<u8>>, deadline: Instant) -> Option<Vec<u8>> {
    let wait = deadline
        .saturating_duration_since(Instant::now())
        .max(DRAIN_GRACE);
    match rx.recv_timeout(wait) {
        Ok(buf) => Some(buf),
        Err(RecvTimeoutError::Disconnected) => Some(Vec::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}
