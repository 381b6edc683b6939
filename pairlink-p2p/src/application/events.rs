use pairlink_core::{PairId, ParticipantId, Role, SessionError, SessionStatus};

/// Events surfaced to the owner of a session controller
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StatusChanged(SessionStatus),
    /// The matcher decided a pairing
    Paired {
        pair_id: PairId,
        role: Role,
        peer: ParticipantId,
    },
    /// Crossed proposals were reconciled and the local role changed
    RoleChanged(Role),
    RemoteMediaAttached,
    /// Non-fatal problem (malformed candidate)
    Diagnostic(SessionError),
}
