use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DEFAULT_COMPILE_TIMEOUT_MS, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIME_LIMIT_MS};

/// One judging unit of work. Lives only for the duration of a single
/// [`crate::core::judge::Judge::submit`] call.
#[derive(Clone, Debug)]
pub struct Submission {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub code: String,
    pub language: String,
    pub testcases: Vec<TestCase>,
    pub time_limit_ms: Option<u64>,
}

impl Submission {
    pub fn new(
        code: impl Into<String>,
        language: impl Into<String>,
        testcases: Vec<TestCase>,
        time_limit_ms: Option<u64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            code: code.into(),
            language: language.into(),
            testcases,
            time_limit_ms,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub output: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Test data of a problem as it is stored by the problem owner.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
    /// Shown to the user, judged on demand.
    #[serde(default)]
    pub samples: Vec<TestCase>,
    /// Never returned to the client, used for the authoritative verdict.
    #[serde(default, alias = "testcases")]
    pub hiddens: Vec<TestCase>,
}

impl Problem {
    pub fn suite(&self, suite: TestSuite) -> &[TestCase] {
        match suite {
            TestSuite::Samples => &self.samples,
            TestSuite::Hidden => &self.hiddens,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum TestSuite {
    Samples,
    Hidden,
}

/// A program and its arguments. No shell is involved when it is executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a command string on whitespace. Quoting is not supported.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }

    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self::new(program.clone(), args.iter().cloned()))
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.program)
        } else {
            write!(f, "{} {}", self.program, self.args.iter().join(" "))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Language {
    pub id: String,
    /// File name the source is written to inside the workspace. Some
    /// toolchains derive the entry point from it (e.g. `Main.java`).
    pub source_file: String,
    pub compile: Option<CommandLine>,
    pub run: CommandLine,
    /// Overrides [`Limits::compile_timeout`] for this language.
    pub compile_timeout: Option<Duration>,
}

impl Language {
    pub fn interpreted(id: &str, source_file: &str, run: CommandLine) -> Self {
        Self {
            id: id.to_string(),
            source_file: source_file.to_string(),
            compile: None,
            run,
            compile_timeout: None,
        }
    }

    pub fn compiled(id: &str, source_file: &str, compile: CommandLine, run: CommandLine) -> Self {
        Self {
            compile: Some(compile),
            ..Self::interpreted(id, source_file, run)
        }
    }

    pub fn with_compile_timeout(self, timeout: Duration) -> Self {
        Self {
            compile_timeout: Some(timeout),
            ..self
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    pub default_time_limit: Duration,
    pub compile_timeout: Duration,
    /// Applies to stdout and stderr independently.
    pub max_output_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            default_time_limit: Duration::from_millis(DEFAULT_TIME_LIMIT_MS),
            compile_timeout: Duration::from_millis(DEFAULT_COMPILE_TIMEOUT_MS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub passed: usize,
    pub total: usize,
}

/// Final classification of a submission.
///
/// Only counters leave the judge, so hidden test data cannot leak through
/// a verdict. The compiler diagnostic of [`Verdict::CompilationError`] is
/// returned verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(into = "VerdictRepr")]
pub enum Verdict {
    CompilationError { error: String },
    TimeLimitExceeded(Progress),
    RuntimeError(Progress),
    WrongAnswer(Progress),
    OutputLimitExceeded(Progress),
    Accepted(Progress),
}

impl Verdict {
    pub fn code(&self) -> &'static str {
        match self {
            Verdict::CompilationError { .. } => "CE",
            Verdict::TimeLimitExceeded(_) => "TLE",
            Verdict::RuntimeError(_) => "RE",
            Verdict::WrongAnswer(_) => "WA",
            Verdict::OutputLimitExceeded(_) => "OLE",
            Verdict::Accepted(_) => "AC",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Verdict::CompilationError { .. } => "Compilation Error",
            Verdict::TimeLimitExceeded(_) => "Time Limit Exceeded",
            Verdict::RuntimeError(_) => "Runtime Error",
            Verdict::WrongAnswer(_) => "Wrong Answer",
            Verdict::OutputLimitExceeded(_) => "Output Limit Exceeded",
            Verdict::Accepted(_) => "Accepted",
        }
    }

    pub fn progress(&self) -> Option<Progress> {
        match self {
            Verdict::CompilationError { .. } => None,
            Verdict::TimeLimitExceeded(progress)
            | Verdict::RuntimeError(progress)
            | Verdict::WrongAnswer(progress)
            | Verdict::OutputLimitExceeded(progress)
            | Verdict::Accepted(progress) => Some(*progress),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }
}

#[derive(Serialize)]
struct VerdictRepr {
    verdict: &'static str,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    passed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<usize>,
}

impl From<Verdict> for VerdictRepr {
    fn from(verdict: Verdict) -> Self {
        let progress = verdict.progress();
        let (code, message) = (verdict.code(), verdict.message());
        let error = match verdict {
            Verdict::CompilationError { error } => Some(error),
            _ => None,
        };

        Self {
            verdict: code,
            message,
            error,
            passed: progress.map(|p| p.passed),
            total: progress.map(|p| p.total),
        }
    }
}
