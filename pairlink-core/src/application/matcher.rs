use crate::domain::{LobbyMessage, Membership, PairId, Pairing, ParticipantId, Role};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;

/// What a lobby event made the matcher do
#[derive(Debug, Clone, PartialEq)]
pub enum MatcherOutcome {
    /// Picked a partner: publish `proposal` on the lobby and become Offerer
    Proposed {
        proposal: LobbyMessage,
        pairing: Pairing,
    },

    /// Received a proposal addressed to us: become Answerer
    Accepted(Pairing),

    /// Our partner proposed to us at the same time
    ///
    /// `pairing` carries the reconciled role. `yielded` is true when the local
    /// side gave up the Offerer role.
    Crossed { pairing: Pairing, yielded: bool },
}

/// Lobby-side pairing decision for one participant
///
/// Pure state machine: the caller feeds it lobby events and executes the
/// returned outcome (publishing the proposal, opening the pair topic).
/// At most one pairing is ever decided.
#[derive(Debug, Clone)]
pub struct Matcher {
    local_id: ParticipantId,
    membership: Membership,
    decision: Option<Pairing>,
    crossed: bool,
}

impl Matcher {
    pub fn new(local_id: ParticipantId) -> Self {
        Self {
            local_id,
            membership: Membership::new(),
            decision: None,
            crossed: false,
        }
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    pub fn decision(&self) -> Option<&Pairing> {
        self.decision.as_ref()
    }

    pub fn is_decided(&self) -> bool {
        self.decision.is_some()
    }

    /// Membership snapshot delivered when the lobby subscription opened
    pub fn on_members<R: Rng + ?Sized>(
        &mut self,
        snapshot: Vec<ParticipantId>,
        rng: &mut R,
    ) -> Option<MatcherOutcome> {
        self.membership.replace(snapshot);

        if self.decision.is_some() {
            tracing::debug!("Ignoring lobby snapshot, pairing already decided");
            return None;
        }

        let others = self.membership.others(&self.local_id);
        let Some(target) = others.choose(rng).cloned() else {
            tracing::info!("⏳ Alone in the lobby, waiting for a peer");
            return None;
        };

        let pair_id = PairId::derive(&self.local_id, &target);
        let pairing = Pairing::new(pair_id.clone(), Role::Offerer, target.clone());
        self.decision = Some(pairing.clone());

        tracing::info!(
            "🎯 Proposing pair {} to {} ({} candidates in lobby)",
            pair_id,
            target.short(),
            others.len()
        );

        Some(MatcherOutcome::Proposed {
            proposal: LobbyMessage::proposal(pair_id, target),
            pairing,
        })
    }

    pub fn on_member_joined(&mut self, id: ParticipantId) {
        tracing::debug!("Lobby member joined: {}", id.short());
        self.membership.join(id);
    }

    pub fn on_member_left(&mut self, id: &ParticipantId) {
        tracing::debug!("Lobby member left: {}", id.short());
        self.membership.leave(id);
    }

    /// Message published on the lobby by `from` (possibly ourselves)
    pub fn on_message(&mut self, from: &ParticipantId, payload: &Value) -> Option<MatcherOutcome> {
        if *from == self.local_id {
            return None;
        }

        let proposal = match LobbyMessage::from_value(payload) {
            Ok(LobbyMessage::Match(proposal)) => proposal,
            Err(e) => {
                tracing::debug!("Ignoring lobby message from {}: {}", from.short(), e);
                return None;
            }
        };

        if proposal.target != self.local_id {
            return None;
        }

        match &mut self.decision {
            None => {
                let pairing = Pairing::new(proposal.pair_id, Role::Answerer, from.clone());
                tracing::info!(
                    "🤝 Accepted proposal for pair {} from {}",
                    pairing.pair_id,
                    from.short()
                );
                self.decision = Some(pairing.clone());
                Some(MatcherOutcome::Accepted(pairing))
            }
            Some(decision)
                if !self.crossed
                    && decision.role == Role::Offerer
                    && decision.peer == *from
                    && decision.pair_id == proposal.pair_id =>
            {
                self.crossed = true;
                let yielded = self.local_id > *from;
                if yielded {
                    decision.role = Role::Answerer;
                }
                tracing::info!(
                    "🔀 Crossed proposals for pair {}, local role is now {}",
                    decision.pair_id,
                    decision.role
                );
                Some(MatcherOutcome::Crossed {
                    pairing: decision.clone(),
                    yielded,
                })
            }
            Some(_) => {
                tracing::debug!(
                    "Ignoring proposal from {}, pairing already decided",
                    from.short()
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn proposal_value(pair: &str, target: &str) -> Value {
        json!({"type": "match", "pairId": pair, "target": target})
    }

    #[test]
    fn test_lone_participant_waits() {
        let mut matcher = Matcher::new(id("X"));
        assert!(matcher.on_members(vec![id("X")], &mut rng()).is_none());
        assert!(!matcher.is_decided());
    }

    #[test]
    fn test_empty_snapshot_waits() {
        let mut matcher = Matcher::new(id("X"));
        assert!(matcher.on_members(vec![], &mut rng()).is_none());
    }

    #[test]
    fn test_second_joiner_proposes() {
        let mut matcher = Matcher::new(id("Y"));
        let outcome = matcher.on_members(vec![id("X"), id("Y")], &mut rng());

        let Some(MatcherOutcome::Proposed { proposal, pairing }) = outcome else {
            panic!("expected a proposal, got {:?}", outcome);
        };
        assert_eq!(pairing.role, Role::Offerer);
        assert_eq!(pairing.peer, id("X"));
        assert_eq!(pairing.pair_id.as_str(), "X-Y");
        assert_eq!(
            proposal.to_value().unwrap(),
            proposal_value("X-Y", "X")
        );
    }

    #[test]
    fn test_proposal_picks_from_current_snapshot_only() {
        let mut matcher = Matcher::new(id("me"));
        matcher.on_member_joined(id("gone"));
        let outcome = matcher.on_members(vec![id("me"), id("a"), id("b")], &mut rng());

        let Some(MatcherOutcome::Proposed { pairing, .. }) = outcome else {
            panic!("expected a proposal");
        };
        assert!(pairing.peer == id("a") || pairing.peer == id("b"));
    }

    #[test]
    fn test_later_snapshots_do_not_propose_again() {
        let mut matcher = Matcher::new(id("Y"));
        assert!(matcher
            .on_members(vec![id("X"), id("Y")], &mut rng())
            .is_some());
        assert!(matcher
            .on_members(vec![id("X"), id("Y"), id("Z")], &mut rng())
            .is_none());
        assert_eq!(matcher.membership().len(), 3);
    }

    #[test]
    fn test_target_accepts_proposal() {
        let mut matcher = Matcher::new(id("X"));
        matcher.on_members(vec![id("X")], &mut rng());

        let outcome = matcher.on_message(&id("Y"), &proposal_value("X-Y", "X"));
        assert_eq!(
            outcome,
            Some(MatcherOutcome::Accepted(Pairing::new(
                PairId::derive(&id("X"), &id("Y")),
                Role::Answerer,
                id("Y"),
            )))
        );
    }

    #[test]
    fn test_proposals_for_others_are_ignored() {
        let mut matcher = Matcher::new(id("X"));
        assert!(matcher
            .on_message(&id("Y"), &proposal_value("Y-Z", "Z"))
            .is_none());
        assert!(!matcher.is_decided());
    }

    #[test]
    fn test_self_originated_messages_are_ignored() {
        let mut matcher = Matcher::new(id("X"));
        // Even a proposal that names us as target
        assert!(matcher
            .on_message(&id("X"), &proposal_value("X-X", "X"))
            .is_none());
        assert!(!matcher.is_decided());
    }

    #[test]
    fn test_garbage_lobby_payloads_are_ignored() {
        let mut matcher = Matcher::new(id("X"));
        assert!(matcher.on_message(&id("Y"), &json!({"hello": 1})).is_none());
        assert!(matcher.on_message(&id("Y"), &json!(null)).is_none());
    }

    #[test]
    fn test_already_decided_guard() {
        let mut matcher = Matcher::new(id("X"));
        matcher.on_message(&id("Y"), &proposal_value("X-Y", "X"));

        assert!(matcher
            .on_message(&id("Z"), &proposal_value("X-Z", "X"))
            .is_none());
        assert_eq!(matcher.decision().unwrap().peer, id("Y"));
    }

    #[test]
    fn test_crossed_proposals_greater_id_yields() {
        let mut low = Matcher::new(id("A"));
        let mut high = Matcher::new(id("B"));

        low.on_members(vec![id("A"), id("B")], &mut rng());
        high.on_members(vec![id("A"), id("B")], &mut rng());

        let low_outcome = low.on_message(&id("B"), &proposal_value("A-B", "A"));
        let high_outcome = high.on_message(&id("A"), &proposal_value("A-B", "B"));

        assert!(matches!(
            low_outcome,
            Some(MatcherOutcome::Crossed { yielded: false, .. })
        ));
        assert!(matches!(
            high_outcome,
            Some(MatcherOutcome::Crossed { yielded: true, .. })
        ));
        assert_eq!(low.decision().unwrap().role, Role::Offerer);
        assert_eq!(high.decision().unwrap().role, Role::Answerer);
    }

    #[test]
    fn test_crossing_is_reported_once() {
        let mut matcher = Matcher::new(id("B"));
        matcher.on_members(vec![id("A"), id("B")], &mut rng());
        assert!(matcher
            .on_message(&id("A"), &proposal_value("A-B", "B"))
            .is_some());
        assert!(matcher
            .on_message(&id("A"), &proposal_value("A-B", "B"))
            .is_none());
    }
}
