//! Pairing protocol core
//!
//! Pure, synchronous state machines: the lobby [`Matcher`] and the per-pair
//! [`Handshake`]. No I/O happens here; callers feed events in and execute
//! the returned outcomes.

pub mod application;
pub mod domain;

pub use application::{
    Handshake, HandshakeOutput, HandshakePhase, HandshakeStep, Matcher, MatcherOutcome,
};
pub use domain::{
    LobbyMessage, MatchProposal, Membership, PairId, Pairing, ParticipantId, Role,
    SessionError, SessionStatus, SignalingDecodeError, SignalingKind, SignalingMessage,
};
pub use domain::error::Result;
