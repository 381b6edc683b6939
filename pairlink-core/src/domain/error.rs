use serde::{Deserialize, Serialize};

/// Failure taxonomy of a pairing session
///
/// Every variant carries a human-readable cause. Only `MalformedCandidate`
/// is non-fatal; all others end the session (or the attempt to start it).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum SessionError {
    #[error("Media access denied: {0}")]
    MediaAccessDenied(String),

    #[error("Could not connect to signaling relay: {0}")]
    SignalingConnectError(String),

    #[error("Could not open topic '{topic}': {reason}")]
    TopicOpenError { topic: String, reason: String },

    #[error("Malformed handshake message: {0}")]
    MalformedHandshakeMessage(String),

    #[error("Malformed candidate: {0}")]
    MalformedCandidate(String),

    #[error("Negotiation transport failure: {0}")]
    NegotiationTransportFailure(String),
}

impl SessionError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SessionError::MalformedCandidate(_))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
