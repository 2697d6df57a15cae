use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("Git operation failed: {0}")]
    Git(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    /// More than one branch references the same issue number. The ambiguous
    /// set is carried so the caller can report every candidate instead of
    /// silently picking one.
    #[error("Multiple branches reference issue #{issue_number}: {}", branches.join(", "))]
    MultipleBranches {
        issue_number: u64,
        branches: Vec<String>,
    },

    /// The external editor exited successfully but HEAD did not move.
    #[error("External editor made no changes to the working copy")]
    NoChanges,

    #[error("External editor failed: {0}")]
    Editor(String),

    #[error("LLM API error: {0}")]
    LlmApi(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<octocrab::Error> for AppError {
    fn from(e: octocrab::Error) -> Self {
        AppError::GitHubApi(e.to_string())
    }
}

impl From<git2::Error> for AppError {
    fn from(e: git2::Error) -> Self {
        AppError::Git(e.message().to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
