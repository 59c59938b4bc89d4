use std::sync::Arc;
use std::time::Duration;

use crate::core::{
    domain::{Language, Limits, Problem, Submission, TestSuite, Verdict},
    errors::JudgeError,
    pipeline::{compiling::compile, running::run_testcases},
    registry::LanguageRegistry,
    traits::runner::ProcessRunner,
    workspace::{Workspace, Workspaces},
};

/// Drives one submission through the optional compile stage and the test
/// runs. Holds no per-submission state, so one instance can serve many
/// concurrent submissions.
#[derive(Debug)]
pub struct Judge {
    runner: Arc<dyn ProcessRunner>,
    registry: LanguageRegistry,
    workspaces: Workspaces,
    limits: Limits,
}

impl Judge {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        registry: LanguageRegistry,
        workspaces: Workspaces,
        limits: Limits,
    ) -> Self {
        Self {
            runner,
            registry,
            workspaces,
            limits,
        }
    }

    #[tracing::instrument(
        skip_all,
        fields(submission = %submission.id, language = %submission.language)
    )]
    pub async fn submit(&self, submission: Submission) -> Result<Verdict, JudgeError> {
        let language = self.registry.resolve(&submission.language)?;
        if submission.testcases.is_empty() {
            return Err(JudgeError::NoTestcases);
        }

        let workspace = self.workspaces.acquire().await?;
        // A panic or a dropped future still removes the directory through
        // `Workspace::drop`.
        let result = self.judge_in(&workspace, language, &submission).await;
        workspace.release().await;

        let elapsed_ms = (chrono::Utc::now() - submission.created_at).num_milliseconds();
        match &result {
            Ok(verdict) => tracing::info!(
                "Submission judged: verdict={}, progress={:?}, elapsed_ms={}",
                verdict.code(),
                verdict.progress(),
                elapsed_ms
            ),
            Err(e) => tracing::error!("Submission failed: {}, elapsed_ms={}", e, elapsed_ms),
        }

        result
    }

    /// Judges `code` against one suite of `problem`: samples for a trial
    /// run, hidden cases for the authoritative verdict.
    pub async fn submit_problem(
        &self,
        code: &str,
        language: &str,
        problem: &Problem,
        suite: TestSuite,
    ) -> Result<Verdict, JudgeError> {
        let submission = Submission::new(
            code,
            language,
            problem.suite(suite).to_vec(),
            problem.time_limit_ms,
        );
        self.submit(submission).await
    }

    async fn judge_in(
        &self,
        workspace: &Workspace,
        language: &Language,
        submission: &Submission,
    ) -> Result<Verdict, JudgeError> {
        workspace
            .write_source(&language.source_file, &submission.code)
            .await?;

        let compile_timeout = language
            .compile_timeout
            .unwrap_or(self.limits.compile_timeout);
        if let Some(verdict) = compile(
            self.runner.as_ref(),
            language,
            workspace.path(),
            compile_timeout,
            self.limits.max_output_bytes,
        )
        .await?
        {
            return Ok(verdict);
        }

        run_testcases(
            self.runner.as_ref(),
            language,
            workspace.path(),
            &submission.testcases,
            self.time_limit(submission),
            self.limits.max_output_bytes,
        )
        .await
    }

    fn time_limit(&self, submission: &Submission) -> Duration {
        submission
            .time_limit_ms
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(self.limits.default_time_limit)
    }
}
