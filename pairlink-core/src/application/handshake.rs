use crate::domain::{
    PairId, Pairing, ParticipantId, Role, SessionError, SignalingDecodeError, SignalingKind,
    SignalingMessage,
};
use serde_json::Value;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Idle,
    AwaitingMembers,
    Active,
    Terminated,
}

/// Engine or relay work the caller must perform, in order
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeStep {
    AttachMedia,
    /// Create an offer, apply it locally, publish it
    SendOffer,
    ApplyOffer(Value),
    /// Create an answer, apply it locally, publish it
    SendAnswer,
    ApplyAnswer(Value),
    AddCandidate(Value),
    SendCandidate(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeOutput {
    Activated,
    Step(HandshakeStep),
    /// Non-fatal problem, the session goes on
    Diagnostic(SessionError),
    /// Final output; `None` for an orderly stop
    Terminated(Option<SessionError>),
}

/// Offer/answer/candidate state machine for one pair
///
/// Phases: Idle → AwaitingMembers → Active → Terminated. Inputs come from the
/// pair topic and the negotiation engine; outputs are ordered steps. Remote
/// candidates never overtake the remote description they belong to.
#[derive(Debug, Clone)]
pub struct Handshake {
    local_id: ParticipantId,
    pairing: Pairing,
    phase: HandshakePhase,
    peer_present: bool,
    awaiting_answer: bool,
    renegotiate_pending: bool,
    remote_description_set: bool,
    queued_candidates: VecDeque<Value>,
    buffered: Vec<Value>,
    crossed: bool,
    yielded_offer_outstanding: bool,
}

impl Handshake {
    pub fn new(local_id: ParticipantId, pairing: Pairing) -> Self {
        Self {
            local_id,
            pairing,
            phase: HandshakePhase::Idle,
            peer_present: false,
            awaiting_answer: false,
            renegotiate_pending: false,
            remote_description_set: false,
            queued_candidates: VecDeque::new(),
            buffered: Vec::new(),
            crossed: false,
            yielded_offer_outstanding: false,
        }
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    pub fn role(&self) -> Role {
        self.pairing.role
    }

    pub fn pair_id(&self) -> &PairId {
        &self.pairing.pair_id
    }

    pub fn peer(&self) -> &ParticipantId {
        &self.pairing.peer
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == HandshakePhase::Terminated
    }

    pub fn queued_candidates(&self) -> usize {
        self.queued_candidates.len()
    }

    /// Pair topic subscription acknowledged
    pub fn opened(&mut self) {
        if self.phase == HandshakePhase::Idle {
            self.phase = HandshakePhase::AwaitingMembers;
        }
    }

    pub fn on_members(&mut self, snapshot: &[ParticipantId]) -> Vec<HandshakeOutput> {
        if snapshot.contains(&self.pairing.peer) {
            self.peer_arrived()
        } else {
            Vec::new()
        }
    }

    pub fn on_member_joined(&mut self, id: &ParticipantId) -> Vec<HandshakeOutput> {
        if *id == self.pairing.peer {
            self.peer_arrived()
        } else {
            tracing::debug!("Ignoring third participant {} on pair topic", id.short());
            Vec::new()
        }
    }

    pub fn on_member_left(&mut self, id: &ParticipantId) -> Vec<HandshakeOutput> {
        let mut out = Vec::new();
        if *id == self.pairing.peer && self.peer_present {
            self.peer_present = false;
            self.terminate(
                Some(SessionError::NegotiationTransportFailure(format!(
                    "peer {} left the pair topic",
                    id
                ))),
                &mut out,
            );
        }
        out
    }

    /// Payload published on the pair topic by `from`
    pub fn on_data(&mut self, from: &ParticipantId, payload: Value) -> Vec<HandshakeOutput> {
        let mut out = Vec::new();
        if *from == self.local_id {
            return out;
        }
        if *from != self.pairing.peer {
            tracing::debug!("Ignoring message from non-peer {}", from.short());
            return out;
        }

        match self.phase {
            HandshakePhase::Idle | HandshakePhase::AwaitingMembers => {
                tracing::debug!("Buffering early signaling message");
                self.buffered.push(payload);
            }
            HandshakePhase::Active => self.handle_payload(payload, &mut out),
            HandshakePhase::Terminated => {}
        }
        out
    }

    pub fn on_negotiation_needed(&mut self) -> Vec<HandshakeOutput> {
        let mut out = Vec::new();
        if self.phase != HandshakePhase::Active || self.pairing.role != Role::Offerer {
            return out;
        }
        if self.awaiting_answer {
            tracing::debug!("Offer outstanding, coalescing renegotiation");
            self.renegotiate_pending = true;
        } else {
            self.send_offer(&mut out);
        }
        out
    }

    pub fn on_local_candidate(&mut self, candidate: Value) -> Vec<HandshakeOutput> {
        if self.is_terminated() {
            return Vec::new();
        }
        vec![HandshakeOutput::Step(HandshakeStep::SendCandidate(candidate))]
    }

    /// Pair topic closed or engine connection lost
    pub fn on_transport_failure(&mut self, reason: impl Into<String>) -> Vec<HandshakeOutput> {
        let mut out = Vec::new();
        self.terminate(
            Some(SessionError::NegotiationTransportFailure(reason.into())),
            &mut out,
        );
        out
    }

    /// A step failed in a way that ends the session
    pub fn fail(&mut self, error: SessionError) -> Vec<HandshakeOutput> {
        let mut out = Vec::new();
        self.terminate(Some(error), &mut out);
        out
    }

    pub fn stop(&mut self) -> Vec<HandshakeOutput> {
        let mut out = Vec::new();
        self.terminate(None, &mut out);
        out
    }

    /// Apply a crossed-proposal reconciliation decided in the lobby
    pub fn resolve_crossed(&mut self, yielded: bool) -> Vec<HandshakeOutput> {
        self.crossed = true;
        if yielded && self.pairing.role == Role::Offerer {
            self.pairing.role = Role::Answerer;
            self.yielded_offer_outstanding = self.awaiting_answer;
            self.awaiting_answer = false;
            self.renegotiate_pending = false;
            tracing::info!("↩️ Yielded Offerer role for pair {}", self.pairing.pair_id);
        }
        Vec::new()
    }

    fn peer_arrived(&mut self) -> Vec<HandshakeOutput> {
        let mut out = Vec::new();
        self.peer_present = true;
        if self.phase != HandshakePhase::AwaitingMembers {
            return out;
        }

        self.phase = HandshakePhase::Active;
        tracing::info!(
            "🔗 Pair {} active as {}",
            self.pairing.pair_id,
            self.pairing.role
        );
        out.push(HandshakeOutput::Activated);
        out.push(HandshakeOutput::Step(HandshakeStep::AttachMedia));

        if self.pairing.role == Role::Offerer {
            self.send_offer(&mut out);
        }

        for payload in std::mem::take(&mut self.buffered) {
            if self.is_terminated() {
                break;
            }
            self.handle_payload(payload, &mut out);
        }
        out
    }

    fn send_offer(&mut self, out: &mut Vec<HandshakeOutput>) {
        self.awaiting_answer = true;
        out.push(HandshakeOutput::Step(HandshakeStep::SendOffer));
    }

    fn handle_payload(&mut self, payload: Value, out: &mut Vec<HandshakeOutput>) {
        let message = match SignalingMessage::decode(&payload) {
            Ok(message) => message,
            Err(SignalingDecodeError::Unrecognized) => {
                tracing::debug!("Ignoring unrecognized pair-topic message");
                return;
            }
            Err(SignalingDecodeError::Malformed {
                kind: SignalingKind::Candidate,
                reason,
            }) => {
                tracing::warn!("⚠️ Dropping malformed candidate: {}", reason);
                out.push(HandshakeOutput::Diagnostic(
                    SessionError::MalformedCandidate(reason),
                ));
                return;
            }
            Err(e) => {
                self.terminate(
                    Some(SessionError::MalformedHandshakeMessage(e.to_string())),
                    out,
                );
                return;
            }
        };

        match message {
            SignalingMessage::Offer { offer } => self.handle_offer(offer, out),
            SignalingMessage::Answer { answer } => self.handle_answer(answer, out),
            SignalingMessage::Candidate { candidate } => {
                if self.remote_description_set {
                    out.push(HandshakeOutput::Step(HandshakeStep::AddCandidate(candidate)));
                } else {
                    tracing::debug!("Queueing candidate until remote description is set");
                    self.queued_candidates.push_back(candidate);
                }
            }
        }
    }

    fn handle_offer(&mut self, offer: Value, out: &mut Vec<HandshakeOutput>) {
        match self.pairing.role {
            Role::Answerer => {
                self.apply_remote_description(HandshakeStep::ApplyOffer(offer), out);
                out.push(HandshakeOutput::Step(HandshakeStep::SendAnswer));
            }
            Role::Offerer if self.crossed => {
                tracing::warn!(
                    "⚠️ Dropping colliding offer from {}, peer yields in crossed pairing",
                    self.pairing.peer.short()
                );
                out.push(HandshakeOutput::Diagnostic(
                    SessionError::MalformedHandshakeMessage(
                        "colliding offer dropped in crossed pairing".to_string(),
                    ),
                ));
            }
            Role::Offerer => {
                tracing::error!("❌ Offer received while Offerer");
                self.terminate(
                    Some(SessionError::MalformedHandshakeMessage(
                        "offer received by the Offerer".to_string(),
                    )),
                    out,
                );
            }
        }
    }

    fn handle_answer(&mut self, answer: Value, out: &mut Vec<HandshakeOutput>) {
        if self.pairing.role == Role::Answerer && self.yielded_offer_outstanding {
            tracing::debug!("Dropping answer to offer sent before yielding");
            self.yielded_offer_outstanding = false;
            return;
        }
        if self.pairing.role != Role::Offerer || !self.awaiting_answer {
            tracing::error!("❌ Answer received without an outstanding offer");
            self.terminate(
                Some(SessionError::MalformedHandshakeMessage(
                    "answer without an outstanding offer".to_string(),
                )),
                out,
            );
            return;
        }

        self.awaiting_answer = false;
        self.apply_remote_description(HandshakeStep::ApplyAnswer(answer), out);

        if self.renegotiate_pending {
            self.renegotiate_pending = false;
            self.send_offer(out);
        }
    }

    fn apply_remote_description(&mut self, step: HandshakeStep, out: &mut Vec<HandshakeOutput>) {
        out.push(HandshakeOutput::Step(step));
        self.remote_description_set = true;
        out.extend(
            self.queued_candidates
                .drain(..)
                .map(|c| HandshakeOutput::Step(HandshakeStep::AddCandidate(c))),
        );
    }

    fn terminate(&mut self, cause: Option<SessionError>, out: &mut Vec<HandshakeOutput>) {
        if self.is_terminated() {
            return;
        }
        match &cause {
            Some(err) => tracing::warn!("🛑 Pair {} terminated: {}", self.pairing.pair_id, err),
            None => tracing::info!("🛑 Pair {} closed", self.pairing.pair_id),
        }
        self.phase = HandshakePhase::Terminated;
        self.queued_candidates.clear();
        self.buffered.clear();
        out.push(HandshakeOutput::Terminated(cause));
    }
}
