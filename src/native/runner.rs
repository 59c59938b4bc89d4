use std::io::ErrorKind;
use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::time::{Instant, sleep};

use crate::core::traits::runner::{
    OutputStream, ProcessRunner, RunOptions, RunOutcome, RunResult,
};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Spawns processes directly with tokio, without any sandbox around them.
#[derive(Clone, Debug, Default)]
pub struct NativeRunner;

impl NativeRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ProcessRunner for NativeRunner {
    #[tracing::instrument(skip(self, options), fields(dir = %options.working_dir.display()))]
    async fn run(&self, program: &str, args: &[String], options: &RunOptions) -> RunResult {
        let start = Instant::now();

        let mut child = match Command::new(program)
            .args(args)
            .current_dir(&options.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!("Failed to spawn process: {}", e);
                return RunResult::failed_to_start(format!("Failed to spawn process: {}", e));
            }
        };

        // Fed from its own task while the output pipes are drained.
        let stdin_writer = child.stdin.take().map(|mut pipe| {
            let input = options.stdin.clone();
            tokio::spawn(async move {
                pipe.write_all(input.as_bytes()).await?;
                pipe.shutdown().await
            })
        });

        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill().await;
            return RunResult::failed_to_start("Process output pipes are unavailable");
        };

        let mut captured_stdout = CappedBuffer::new(options.max_output_bytes);
        let mut captured_stderr = CappedBuffer::new(options.max_output_bytes);
        let mut stdout_chunk = [0u8; READ_CHUNK_SIZE];
        let mut stderr_chunk = [0u8; READ_CHUNK_SIZE];
        let mut stdout_open = true;
        let mut stderr_open = true;

        let deadline = sleep(options.timeout);
        tokio::pin!(deadline);

        let mut outcome = loop {
            tokio::select! {
                _ = &mut deadline => break RunOutcome::TimedOut,
                read = stdout.read(&mut stdout_chunk), if stdout_open => match read {
                    Ok(0) | Err(_) => stdout_open = false,
                    Ok(n) => {
                        if !captured_stdout.push(&stdout_chunk[..n]) {
                            break RunOutcome::OutputLimitExceeded(OutputStream::Stdout);
                        }
                    }
                },
                read = stderr.read(&mut stderr_chunk), if stderr_open => match read {
                    Ok(0) | Err(_) => stderr_open = false,
                    Ok(n) => {
                        if !captured_stderr.push(&stderr_chunk[..n]) {
                            break RunOutcome::OutputLimitExceeded(OutputStream::Stderr);
                        }
                    }
                },
                status = child.wait(), if !stdout_open && !stderr_open => break match status {
                    Ok(status) => RunOutcome::Exited(status.into()),
                    Err(e) => RunOutcome::FailedToStart {
                        reason: format!("Failed to wait for process: {}", e),
                    },
                },
            }
        };

        if !matches!(outcome, RunOutcome::Exited(_)) {
            // Also reaps the child.
            if let Err(e) = child.kill().await {
                tracing::debug!("Failed to kill process: {}", e);
            }
        }

        if let Some(writer) = stdin_writer {
            if writer.is_finished() {
                if let Ok(Err(e)) = writer.await {
                    // The child closing its stdin early is its own business.
                    if e.kind() != ErrorKind::BrokenPipe {
                        outcome = RunOutcome::FailedToStart {
                            reason: format!("Failed to write to stdin: {}", e),
                        };
                    }
                }
            } else {
                writer.abort();
            }
        }

        let result = RunResult {
            outcome,
            stdout: captured_stdout.into_string(),
            stderr: captured_stderr.into_string(),
            elapsed: start.elapsed(),
        };
        tracing::debug!(
            "Process finished: outcome={:?}, elapsed={:?}",
            result.outcome,
            result.elapsed
        );
        result
    }
}

/// Keeps at most `cap` bytes of a stream.
#[derive(Debug)]
struct CappedBuffer {
    bytes: Vec<u8>,
    cap: usize,
}

impl CappedBuffer {
    fn new(cap: usize) -> Self {
        Self {
            bytes: Vec::new(),
            cap,
        }
    }

    /// Returns `false` once the stream went over the cap; the part that
    /// still fits is kept.
    fn push(&mut self, chunk: &[u8]) -> bool {
        let room = self.cap.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.bytes.extend_from_slice(&chunk[..room]);
            return false;
        }
        self.bytes.extend_from_slice(chunk);
        true
    }

    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}
