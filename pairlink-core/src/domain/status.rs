use crate::domain::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a session as seen by the caller
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionStatus {
    #[default]
    Idle,
    RequestingMedia,
    /// Preview mode: media acquired, no signaling
    Previewing,
    ConnectingSignaling,
    WaitingForPeer,
    Matched,
    Ended,
    Failed(SessionError),
}

impl SessionStatus {
    /// Ended or Failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Ended | SessionStatus::Failed(_))
    }

    /// Holds (or is acquiring) resources
    pub fn is_live(&self) -> bool {
        !matches!(self, SessionStatus::Idle) && !self.is_terminal()
    }

    pub fn failure(&self) -> Option<&SessionError> {
        match self {
            SessionStatus::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "Idle"),
            SessionStatus::RequestingMedia => write!(f, "RequestingMedia"),
            SessionStatus::Previewing => write!(f, "Previewing"),
            SessionStatus::ConnectingSignaling => write!(f, "ConnectingSignaling"),
            SessionStatus::WaitingForPeer => write!(f, "WaitingForPeer"),
            SessionStatus::Matched => write!(f, "Matched"),
            SessionStatus::Ended => write!(f, "Ended"),
            SessionStatus::Failed(err) => write!(f, "Failed({})", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_and_live() {
        assert!(!SessionStatus::Idle.is_live());
        assert!(!SessionStatus::Idle.is_terminal());

        assert!(SessionStatus::WaitingForPeer.is_live());
        assert!(SessionStatus::Previewing.is_live());

        assert!(SessionStatus::Ended.is_terminal());
        let failed = SessionStatus::Failed(SessionError::MediaAccessDenied("no".into()));
        assert!(failed.is_terminal());
        assert!(!failed.is_live());
        assert!(failed.failure().is_some());
    }
}
