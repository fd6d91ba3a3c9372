use thiserror::Error;

#[derive(Error, Debug)]
pub enum InvestigatorError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Planner error: {0}")]
    Planner(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl InvestigatorError {
    /// True for errors raised because the caller stopped waiting.
    pub fn is_interruption(&self) -> bool {
        matches!(
            self,
            InvestigatorError::Cancelled(_) | InvestigatorError::DeadlineExceeded(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, InvestigatorError>;
