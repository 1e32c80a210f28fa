use thiserror::Error;

#[derive(Error, Debug)]
pub enum LearnHubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Run timed out: {0}")]
    Timeout(String),

    #[error("Run ended with status: {0}")]
    TerminalRun(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, LearnHubError>;
