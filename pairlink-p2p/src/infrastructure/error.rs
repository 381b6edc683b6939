/// Relay substrate errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Subscription to '{topic}' refused: {reason}")]
    SubscribeFailed { topic: String, reason: String },

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Relay closed")]
    Closed,
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Serialization(e.to_string())
    }
}

/// Negotiation engine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The remote payload could not be applied
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Engine failure: {0}")]
    Failed(String),

    #[error("Engine closed")]
    Closed,
}

/// Media capture errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("Permission denied: {0}")]
    Denied(String),

    #[error("No capture device: {0}")]
    Unavailable(String),
}

pub type RelayResult<T> = std::result::Result<T, RelayError>;
pub type EngineResult<T> = std::result::Result<T, EngineError>;
pub type MediaResult<T> = std::result::Result<T, MediaError>;
