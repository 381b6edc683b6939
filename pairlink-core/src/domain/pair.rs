use crate::domain::ParticipantId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain entity: canonical identifier shared by both members of a pair
///
/// Derived from the two participant ids by sorting and joining with `-`, so
/// each side computes the same value without a central allocator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairId(String);

impl PairId {
    pub fn derive(a: &ParticipantId, b: &ParticipantId) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}-{}", first, second))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the pair topic for this pair
    pub fn topic_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.0)
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of the handshake a participant drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Sent the match proposal, initiates the handshake
    Offerer,
    /// Received the match proposal, responds to offers
    Answerer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Offerer => write!(f, "Offerer"),
            Role::Answerer => write!(f, "Answerer"),
        }
    }
}

/// Outcome of one matcher run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub pair_id: PairId,
    pub role: Role,
    pub peer: ParticipantId,
}

impl Pairing {
    pub fn new(pair_id: PairId, role: Role, peer: ParticipantId) -> Self {
        Self {
            pair_id,
            role,
            peer,
        }
    }
}
