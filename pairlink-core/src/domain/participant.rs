use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Domain entity: identity of one relay connection
///
/// Assigned by the relay substrate and opaque to the protocol. The only
/// property the protocol relies on is the lexicographic ordering, which is
/// what makes pair identifiers and role tie-breaks agree on both sides.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Members of a topic as last observed
///
/// Replaced wholesale by a membership snapshot and patched by join/leave
/// notifications. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    members: BTreeSet<ParticipantId>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the view with a fresh snapshot
    pub fn replace(&mut self, snapshot: impl IntoIterator<Item = ParticipantId>) {
        self.members = snapshot.into_iter().collect();
    }

    pub fn join(&mut self, id: ParticipantId) -> bool {
        self.members.insert(id)
    }

    pub fn leave(&mut self, id: &ParticipantId) -> bool {
        self.members.remove(id)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.members.contains(id)
    }

    /// Everyone except `local`, in lexicographic order
    pub fn others(&self, local: &ParticipantId) -> Vec<ParticipantId> {
        self.members
            .iter()
            .filter(|id| *id != local)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
