use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::{
    config::JudgeConfig,
    constants::DEFAULT_JOBS,
    core::{
        domain::{Problem, TestSuite, Verdict},
        errors::JudgeError,
        judge::Judge,
    },
    native::runner::NativeRunner,
};

#[derive(Debug, Parser)]
#[command(name = "codejudge", version, about = "Compile and judge untrusted code against test cases")]
pub struct Cli {
    /// TOML configuration file; built-in defaults are used without it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Judge one or more submission request files and print a verdict per file.
    Submit(SubmitArgs),
    /// List the registered languages.
    Languages,
    /// Load and validate the configuration.
    CheckConfig,
}

#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// JSON files of the form {"code", "language", "problem": {"timeLimitMs", "samples", "hiddens"}}.
    #[arg(required = true)]
    pub requests: Vec<PathBuf>,

    /// Which test cases of the problem to judge against.
    #[arg(long, value_enum, default_value_t = TestSuite::Hidden)]
    pub suite: TestSuite,

    /// Read the source code from this file instead of the request's `code`.
    #[arg(long)]
    pub code_file: Option<PathBuf>,

    /// How many requests are judged at the same time.
    #[arg(long, default_value_t = DEFAULT_JOBS)]
    pub jobs: usize,
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    #[serde(default)]
    code: String,
    language: String,
    problem: Problem,
}

#[derive(Debug, thiserror::Error)]
enum RequestError {
    #[error("Failed to read request: {0}")]
    Read(#[from] std::io::Error),
    #[error("Invalid request: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Judge(#[from] JudgeError),
}

impl RequestError {
    fn is_client_error(&self) -> bool {
        match self {
            RequestError::Read(_) | RequestError::Parse(_) => true,
            RequestError::Judge(e) => e.is_client_error(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    request: String,
    ok: bool,
    #[serde(flatten)]
    body: ReportBody,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ReportBody {
    Judged(Verdict),
    Failed { message: String },
}

impl Report {
    fn new(request: &Path, result: &Result<Verdict, RequestError>) -> Self {
        let request = request.display().to_string();
        match result {
            Ok(verdict) => Self {
                request,
                ok: true,
                body: ReportBody::Judged(verdict.clone()),
            },
            Err(e) => Self {
                request,
                ok: false,
                body: ReportBody::Failed {
                    message: e.to_string(),
                },
            },
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = JudgeConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Submit(args) => {
            let judge = Judge::new(
                Arc::new(NativeRunner::new()),
                config.registry()?,
                config.workspaces(),
                config.limits()?,
            );
            submit(Arc::new(judge), args).await
        }
        Command::Languages => {
            for language in config.registry()?.iter() {
                let compile = language
                    .compile
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}\t{}\tcompile: {}\trun: {}",
                    language.id, language.source_file, compile, language.run
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::CheckConfig => {
            let registry = config.registry()?;
            let limits = config.limits()?;
            println!(
                "Configuration is valid: {} languages, workspace root {}, {:?}",
                registry.len(),
                config.workspaces().root().display(),
                limits
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn submit(judge: Arc<Judge>, args: SubmitArgs) -> anyhow::Result<ExitCode> {
    let code_override = match &args.code_file {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read code file {}", path.display()))?,
        ),
        None => None,
    };

    let suite = args.suite;
    let semaphore = Arc::new(Semaphore::new(args.jobs.max(1)));
    let mut pending = FuturesUnordered::new();
    for path in args.requests {
        let judge = judge.clone();
        let semaphore = semaphore.clone();
        let code_override = code_override.clone();

        pending.push(async move {
            let _permit = semaphore.acquire().await;
            let result = judge_request(&judge, &path, code_override, suite).await;
            (path, result)
        });
    }

    let mut exit_code = ExitCode::SUCCESS;
    let mut had_internal_failure = false;
    while let Some((path, result)) = pending.next().await {
        if let Err(e) = &result {
            if e.is_client_error() {
                tracing::warn!("Rejected request {}: {}", path.display(), e);
                if !had_internal_failure {
                    exit_code = ExitCode::from(2);
                }
            } else {
                tracing::error!("Failed to judge {}: {}", path.display(), e);
                had_internal_failure = true;
                exit_code = ExitCode::FAILURE;
            }
        }

        println!("{}", serde_json::to_string(&Report::new(&path, &result))?);
    }

    Ok(exit_code)
}

async fn judge_request(
    judge: &Judge,
    path: &Path,
    code_override: Option<String>,
    suite: TestSuite,
) -> Result<Verdict, RequestError> {
    let content = tokio::fs::read_to_string(path).await?;
    let request: SubmitRequest = serde_json::from_str(&content)?;
    let code = code_override.unwrap_or(request.code);

    Ok(judge
        .submit_problem(&code, &request.language, &request.problem, suite)
        .await?)
}
