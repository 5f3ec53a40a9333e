//! External process execution
//!
//! A [`ProcessRunner`] launches a command, optionally feeds it text on
//! stdin, and captures everything it prints. Nonzero exit codes are data,
//! not errors; only a failure to launch (or an expired timeout) is.

use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Interval between exit checks while a timeout is armed
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured outcome of one process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit code, or -1 when the process was terminated by a signal
    pub exit_code: i32,
    /// Everything written to stdout
    pub stdout: String,
    /// Everything written to stderr
    pub stderr: String,
}

impl ExecutionResult {
    /// Whether the process exited with status zero
    pub fn successful(&self) -> bool {
        self.exit_code == 0
    }
}

/// Failures to run a process at all
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("empty command line")]
    EmptyCommand,

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} did not finish within {timeout:?} and was killed")]
    TimedOut { program: String, timeout: Duration },

    #[error("I/O error while talking to {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Launches external commands
pub trait ProcessRunner: Send + Sync {
    /// Run `command` (program followed by its arguments) to completion.
    ///
    /// `stdin` is piped to the process when given; otherwise stdin is
    /// closed. `working_dir` sets the child's working directory without
    /// touching the current process.
    fn execute(
        &self,
        command: &[String],
        stdin: Option<&str>,
        working_dir: Option<&Path>,
    ) -> Result<ExecutionResult, RunnerError>;
}

/// [`ProcessRunner`] backed by `std::process::Command`
#[derive(Debug, Clone)]
pub struct SystemProcessRunner {
    timeout: Option<Duration>,
    poll_interval: Duration,
}

impl SystemProcessRunner {
    /// Create a runner that waits indefinitely
    pub fn new() -> Self {
        Self {
            timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Kill any process still running after `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The configured timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Wait for `child`, killing it once `limit` has elapsed.
    ///
    /// Returns `None` if the deadline passed. A limit too large to
    /// represent as an [`Instant`] waits without a deadline.
    fn wait_with_deadline(
        &self,
        child: &mut Child,
        limit: Duration,
    ) -> io::Result<Option<ExitStatus>> {
        let deadline = match Instant::now().checked_add(limit) {
            Some(deadline) => deadline,
            None => return child.wait().map(Some),
        };

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }

            let now = Instant::now();
            if now >= deadline {
                // Reap after kill so no zombie is left behind
                let _ = child.kill();
                let _ = child.wait();
                return Ok(None);
            }

            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }
}

impl Default for SystemProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner for SystemProcessRunner {
    fn execute(
        &self,
        command: &[String],
        stdin: Option<&str>,
        working_dir: Option<&Path>,
    ) -> Result<ExecutionResult, RunnerError> {
        let (program, args) = command.split_first().ok_or(RunnerError::EmptyCommand)?;
        let io_error = |source: io::Error| RunnerError::Io {
            program: program.clone(),
            source,
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            program: program.clone(),
            source,
        })?;

        // Feed stdin and drain both output pipes concurrently so a chatty
        // process can never block on a full pipe
        let stdin_writer = match (child.stdin.take(), stdin) {
            (Some(mut pipe), Some(text)) => {
                let text = text.to_owned();
                Some(thread::spawn(move || pipe.write_all(text.as_bytes())))
            }
            _ => None,
        };
        let stdout_reader = spawn_drain(child.stdout.take());
        let stderr_reader = spawn_drain(child.stderr.take());

        let status = match self.timeout {
            Some(limit) => self.wait_with_deadline(&mut child, limit).map_err(io_error)?,
            None => Some(child.wait().map_err(io_error)?),
        };

        if let Some(writer) = stdin_writer {
            match join_helper(writer) {
                // The tool may legitimately exit before reading all input
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                other => other.map_err(io_error)?,
            }
        }
        let stdout = join_helper(stdout_reader).map_err(io_error)?;
        let stderr = join_helper(stderr_reader).map_err(io_error)?;

        let status = match status {
            Some(status) => status,
            None => {
                return Err(RunnerError::TimedOut {
                    program: program.clone(),
                    timeout: self.timeout.unwrap_or_default(),
                })
            }
        };

        Ok(ExecutionResult {
            exit_code: status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

fn spawn_drain<R: Read + Send + 'static>(source: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut source) = source {
            source.read_to_end(&mut buffer)?;
        }
        Ok(buffer)
    })
}

fn join_helper<T>(handle: JoinHandle<io::Result<T>>) -> io::Result<T> {
    handle
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "process I/O thread panicked"))?
}
