use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIME_LIMIT_MS};

#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Must exist before the process is spawned.
    pub working_dir: PathBuf,
    /// Delivered to the process and then closed.
    pub stdin: String,
    /// Wall-clock budget, not CPU time.
    pub timeout: Duration,
    /// Cap for stdout and stderr, each counted separately.
    pub max_output_bytes: usize,
}

impl RunOptions {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            stdin: String::new(),
            timeout: Duration::from_millis(DEFAULT_TIME_LIMIT_MS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_stdin(self, stdin: impl Into<String>) -> Self {
        Self {
            stdin: stdin.into(),
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn with_max_output_bytes(self, max_output_bytes: usize) -> Self {
        Self {
            max_output_bytes,
            ..self
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    Code(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Code(0))
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitStatus::Code(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;

            if let Some(signal) = status.signal() {
                return ExitStatus::Signal(signal);
            }
        }

        ExitStatus::Code(-1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Exited(ExitStatus),
    /// Killed because the wall-clock timer fired.
    TimedOut,
    /// Killed because the stream produced more than the allowed bytes.
    OutputLimitExceeded(OutputStream),
    /// Spawning failed or stdin could not be delivered.
    FailedToStart { reason: String },
}

#[derive(Clone, Debug)]
pub struct RunResult {
    pub outcome: RunOutcome,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl RunResult {
    pub fn failed_to_start(reason: impl Into<String>) -> Self {
        Self {
            outcome: RunOutcome::FailedToStart {
                reason: reason.into(),
            },
            stdout: String::new(),
            stderr: String::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Real exit code, or -1 when the process never started or was killed.
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            RunOutcome::Exited(ExitStatus::Code(code)) => code,
            _ => -1,
        }
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.outcome, RunOutcome::TimedOut)
    }
}

/// Runs exactly one external command to completion or forced termination.
///
/// Implementations always resolve to a [`RunResult`]: limits and start
/// failures are outcomes, not errors. No process may outlive the call.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProcessRunner: std::fmt::Debug + Send + Sync {
    async fn run(&self, program: &str, args: &[String], options: &RunOptions) -> RunResult;
}
