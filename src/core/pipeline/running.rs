use std::path::Path;
use std::time::Duration;

use crate::core::{
    compare::same_output,
    domain::{Language, Progress, TestCase, Verdict},
    errors::JudgeError,
    traits::runner::{ProcessRunner, RunOptions, RunOutcome, RunResult},
};

/// Runs `testcases` strictly in order and stops at the first one that does
/// not pass, so `passed` in the verdict is always a prefix count.
#[tracing::instrument(skip_all, fields(language = %language.id, total = testcases.len()))]
pub async fn run_testcases(
    runner: &dyn ProcessRunner,
    language: &Language,
    working_dir: &Path,
    testcases: &[TestCase],
    time_limit: Duration,
    max_output_bytes: usize,
) -> Result<Verdict, JudgeError> {
    let total = testcases.len();
    let mut passed = 0;

    for (idx, testcase) in testcases.iter().enumerate() {
        let options = RunOptions::new(working_dir)
            .with_stdin(testcase.input.as_str())
            .with_timeout(time_limit)
            .with_max_output_bytes(max_output_bytes);

        let result = runner
            .run(&language.run.program, &language.run.args, &options)
            .await;
        tracing::debug!(
            "Test {} finished: outcome={:?}, elapsed={:?}, stdout_len={}",
            idx,
            result.outcome,
            result.elapsed,
            result.stdout.len()
        );

        let progress = Progress { passed, total };
        if let Some(verdict) = check(&result, testcase, progress, &language.run.program)? {
            tracing::debug!("Test {} failed: {}", idx, verdict.code());
            return Ok(verdict);
        }

        passed += 1;
    }

    Ok(Verdict::Accepted(Progress {
        passed: total,
        total,
    }))
}

fn check(
    result: &RunResult,
    testcase: &TestCase,
    progress: Progress,
    program: &str,
) -> Result<Option<Verdict>, JudgeError> {
    match &result.outcome {
        RunOutcome::FailedToStart { reason } => Err(JudgeError::Spawn {
            program: program.to_string(),
            reason: reason.clone(),
        }),
        RunOutcome::TimedOut => Ok(Some(Verdict::TimeLimitExceeded(progress))),
        RunOutcome::OutputLimitExceeded(_) => Ok(Some(Verdict::OutputLimitExceeded(progress))),
        RunOutcome::Exited(status) if !status.success() => Ok(Some(Verdict::RuntimeError(progress))),
        RunOutcome::Exited(_) if !same_output(&result.stdout, &testcase.output) => {
            Ok(Some(Verdict::WrongAnswer(progress)))
        }
        RunOutcome::Exited(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        domain::CommandLine,
        traits::runner::{ExitStatus, MockProcessRunner, OutputStream},
    };

    fn js() -> Language {
        Language::interpreted("js", "main.js", CommandLine::new("node", ["main.js"]))
    }

    fn exited(code: i32, stdout: &str) -> RunResult {
        RunResult {
            outcome: RunOutcome::Exited(ExitStatus::Code(code)),
            stdout: stdout.to_string(),
            stderr: String::new(),
            elapsed: Duration::from_millis(5),
        }
    }

    fn testcases(pairs: &[(&str, &str)]) -> Vec<TestCase> {
        pairs
            .iter()
            .map(|(input, output)| TestCase::new(*input, *output))
            .collect()
    }

    async fn run(runner: MockProcessRunner, testcases: &[TestCase]) -> Result<Verdict, JudgeError> {
        run_testcases(
            &runner,
            &js(),
            Path::new("/work"),
            testcases,
            Duration::from_millis(2000),
            1024,
        )
        .await
    }

    #[tokio::test]
    async fn test_all_testcases_accepted() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|program, args, options| {
                program == "node"
                    && args == ["main.js"]
                    && options.timeout == Duration::from_millis(2000)
                    && options.max_output_bytes == 1024
            })
            .times(2)
            .returning(|_, _, options| exited(0, &options.stdin));

        let verdict = run(runner, &testcases(&[("1\n", "1"), ("2 3\n", "2 3")])).await;

        assert_eq!(
            verdict.unwrap(),
            Verdict::Accepted(Progress {
                passed: 2,
                total: 2
            })
        );
    }

    #[tokio::test]
    async fn test_wrong_answer_stops_evaluation() {
        let mut runner = MockProcessRunner::new();
        // The third test must never be run.
        runner
            .expect_run()
            .times(2)
            .returning(|_, _, options| exited(0, &options.stdin));

        let verdict = run(runner, &testcases(&[("1", "1"), ("2", "20"), ("3", "3")])).await;

        assert_eq!(
            verdict.unwrap(),
            Verdict::WrongAnswer(Progress {
                passed: 1,
                total: 3
            })
        );
    }

    #[tokio::test]
    async fn test_time_limit_exceeded() {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().times(1).returning(|_, _, _| RunResult {
            outcome: RunOutcome::TimedOut,
            stdout: "1".to_string(),
            stderr: String::new(),
            elapsed: Duration::from_millis(2000),
        });

        let verdict = run(runner, &testcases(&[("1", "1"), ("2", "2")])).await;

        assert_eq!(
            verdict.unwrap(),
            Verdict::TimeLimitExceeded(Progress {
                passed: 0,
                total: 2
            })
        );
    }

    #[tokio::test]
    async fn test_runtime_error_on_non_zero_exit_and_signal() {
        for outcome in [
            RunOutcome::Exited(ExitStatus::Code(1)),
            RunOutcome::Exited(ExitStatus::Signal(11)),
        ] {
            let mut runner = MockProcessRunner::new();
            let mut calls = 0;
            runner.expect_run().times(2).returning(move |_, _, _| {
                calls += 1;
                let mut result = exited(0, "ok");
                if calls == 2 {
                    result.outcome = outcome.clone();
                }
                result
            });

            let verdict = run(runner, &testcases(&[("a", "ok"), ("b", "ok"), ("c", "ok")])).await;

            assert_eq!(
                verdict.unwrap(),
                Verdict::RuntimeError(Progress {
                    passed: 1,
                    total: 3
                })
            );
        }
    }

    #[tokio::test]
    async fn test_runtime_error_wins_over_matching_output() {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(|_, _, _| exited(3, "42"));

        let verdict = run(runner, &testcases(&[("", "42")])).await;

        assert!(matches!(verdict, Ok(Verdict::RuntimeError(_))));
    }

    #[tokio::test]
    async fn test_output_limit_exceeded() {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(|_, _, _| RunResult {
            outcome: RunOutcome::OutputLimitExceeded(OutputStream::Stdout),
            stdout: "y\n".repeat(512),
            stderr: String::new(),
            elapsed: Duration::from_millis(30),
        });

        let verdict = run(runner, &testcases(&[("", "y")])).await;

        assert_eq!(
            verdict.unwrap(),
            Verdict::OutputLimitExceeded(Progress {
                passed: 0,
                total: 1
            })
        );
    }

    #[tokio::test]
    async fn test_failed_to_start_is_not_a_verdict() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|_, _, _| RunResult::failed_to_start("Permission denied"));

        let verdict = run(runner, &testcases(&[("", ""), ("", "")])).await;

        assert!(matches!(
            verdict,
            Err(JudgeError::Spawn { program, reason })
                if program == "node" && reason == "Permission denied"
        ));
    }
}
