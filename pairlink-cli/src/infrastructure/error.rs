use pairlink_core::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Session failed: {0}")]
    Session(#[from] SessionError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Session task failed: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
