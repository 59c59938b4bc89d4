#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("No testcases found for this problem")]
    NoTestcases,
    #[error("Workspace failure: {0}")]
    Workspace(#[from] std::io::Error),
    /// The environment could not start a process, as opposed to the
    /// submitted program crashing.
    #[error("Failed to start `{program}`: {reason}")]
    Spawn { program: String, reason: String },
}

impl JudgeError {
    /// Caller bugs that must not be retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            JudgeError::UnsupportedLanguage(_) | JudgeError::NoTestcases
        )
    }
}
