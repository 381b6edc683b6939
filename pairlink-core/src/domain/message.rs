use crate::domain::{PairId, ParticipantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lobby proposal: "I pair with `target` under `pair_id`"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchProposal {
    #[serde(rename = "pairId")]
    pub pair_id: PairId,
    pub target: ParticipantId,
}

/// Messages published on the lobby topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LobbyMessage {
    #[serde(rename = "match")]
    Match(MatchProposal),
}

impl LobbyMessage {
    pub fn proposal(pair_id: PairId, target: ParticipantId) -> Self {
        LobbyMessage::Match(MatchProposal { pair_id, target })
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn from_value(payload: &Value) -> serde_json::Result<Self> {
        LobbyMessage::deserialize(payload)
    }
}

/// Handshake messages published on a pair topic
///
/// Blobs are opaque to the protocol and handed to the negotiation engine as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    Offer { offer: Value },
    Answer { answer: Value },
    Candidate { candidate: Value },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingKind {
    Offer,
    Answer,
    Candidate,
}

impl SignalingKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "offer" => Some(SignalingKind::Offer),
            "answer" => Some(SignalingKind::Answer),
            "candidate" => Some(SignalingKind::Candidate),
            _ => None,
        }
    }
}

/// Why a pair-topic payload could not be turned into a [`SignalingMessage`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalingDecodeError {
    /// Recognisable kind with an unusable body
    #[error("malformed {kind:?} message: {reason}")]
    Malformed { kind: SignalingKind, reason: String },

    /// Not a handshake message at all
    #[error("unrecognized message")]
    Unrecognized,
}

impl SignalingMessage {
    pub fn kind(&self) -> SignalingKind {
        match self {
            SignalingMessage::Offer { .. } => SignalingKind::Offer,
            SignalingMessage::Answer { .. } => SignalingKind::Answer,
            SignalingMessage::Candidate { .. } => SignalingKind::Candidate,
        }
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Decode a payload, telling malformed handshake messages apart from noise
    ///
    /// A null blob counts as malformed.
    pub fn decode(payload: &Value) -> Result<Self, SignalingDecodeError> {
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .and_then(SignalingKind::from_tag)
            .ok_or(SignalingDecodeError::Unrecognized)?;

        let message = SignalingMessage::deserialize(payload).map_err(|e| {
            SignalingDecodeError::Malformed {
                kind,
                reason: e.to_string(),
            }
        })?;

        let blob = match &message {
            SignalingMessage::Offer { offer } => offer,
            SignalingMessage::Answer { answer } => answer,
            SignalingMessage::Candidate { candidate } => candidate,
        };
        if blob.is_null() {
            return Err(SignalingDecodeError::Malformed {
                kind,
                reason: "empty payload".to_string(),
            });
        }

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_match_proposal_wire_shape() {
        let pair_id = PairId::derive(&ParticipantId::new("X"), &ParticipantId::new("Y"));
        let msg = LobbyMessage::proposal(pair_id, ParticipantId::new("X"));

        assert_eq!(
            msg.to_value().unwrap(),
            json!({"type": "match", "pairId": "X-Y", "target": "X"})
        );
    }

    #[test]
    fn test_lobby_message_rejects_unknown_type() {
        assert!(LobbyMessage::from_value(&json!({"type": "hello"})).is_err());
        assert!(LobbyMessage::from_value(&json!("match")).is_err());
    }

    #[test]
    fn test_signaling_wire_shapes() {
        let offer = SignalingMessage::Offer {
            offer: json!({"type": "offer", "sdp": "v=0"}),
        };
        assert_eq!(
            offer.to_value().unwrap(),
            json!({"type": "offer", "offer": {"type": "offer", "sdp": "v=0"}})
        );

        let candidate = SignalingMessage::Candidate {
            candidate: json!({"candidate": "candidate:1"}),
        };
        assert_eq!(
            candidate.to_value().unwrap()["type"],
            json!("candidate")
        );
    }

    #[test]
    fn test_decode_classifies_malformed_messages() {
        let err = SignalingMessage::decode(&json!({"type": "offer"})).unwrap_err();
        assert!(matches!(
            err,
            SignalingDecodeError::Malformed {
                kind: SignalingKind::Offer,
                ..
            }
        ));

        let err = SignalingMessage::decode(&json!({"type": "candidate", "candidate": null}))
            .unwrap_err();
        assert!(matches!(
            err,
            SignalingDecodeError::Malformed {
                kind: SignalingKind::Candidate,
                ..
            }
        ));

        assert_eq!(
            SignalingMessage::decode(&json!({"type": "bye"})).unwrap_err(),
            SignalingDecodeError::Unrecognized
        );
        assert_eq!(
            SignalingMessage::decode(&json!(42)).unwrap_err(),
            SignalingDecodeError::Unrecognized
        );
    }

    #[test]
    fn test_decode_accepts_well_formed_answer() {
        let msg = SignalingMessage::decode(&json!({"type": "answer", "answer": {"sdp": "a"}}))
            .unwrap();
        assert_eq!(msg.kind(), SignalingKind::Answer);
    }
}
