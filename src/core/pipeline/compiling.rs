use std::path::Path;
use std::time::Duration;

use crate::core::{
    domain::{Language, Verdict},
    errors::JudgeError,
    traits::runner::{ProcessRunner, RunOptions, RunOutcome, RunResult},
};

/// Runs the compile command of `language` once inside `working_dir`.
///
/// Returns `Ok(None)` when the language has no compile stage or compilation
/// succeeded, and the terminal [`Verdict::CompilationError`] otherwise.
#[tracing::instrument(skip(runner, language), fields(language = %language.id))]
pub async fn compile(
    runner: &dyn ProcessRunner,
    language: &Language,
    working_dir: &Path,
    timeout: Duration,
    max_output_bytes: usize,
) -> Result<Option<Verdict>, JudgeError> {
    let Some(command) = &language.compile else {
        tracing::debug!("No compile stage");
        return Ok(None);
    };

    let options = RunOptions::new(working_dir)
        .with_timeout(timeout)
        .with_max_output_bytes(max_output_bytes);

    tracing::debug!("Start compiling: {}", command);
    let result = runner.run(&command.program, &command.args, &options).await;
    tracing::debug!(
        "Compilation finished: outcome={:?}, elapsed={:?}",
        result.outcome,
        result.elapsed
    );

    match &result.outcome {
        RunOutcome::Exited(status) if status.success() => Ok(None),
        RunOutcome::FailedToStart { reason } => Err(JudgeError::Spawn {
            program: command.program.clone(),
            reason: reason.clone(),
        }),
        RunOutcome::TimedOut => {
            let mut error = diagnostics(&result);
            if error.is_empty() {
                error = format!("Compilation timed out after {} ms", timeout.as_millis());
            }
            Ok(Some(Verdict::CompilationError { error }))
        }
        RunOutcome::Exited(_) | RunOutcome::OutputLimitExceeded(_) => {
            Ok(Some(Verdict::CompilationError {
                error: diagnostics(&result),
            }))
        }
    }
}

fn diagnostics(result: &RunResult) -> String {
    if result.stderr.is_empty() {
        result.stdout.clone()
    } else {
        result.stderr.clone()
    }
}
