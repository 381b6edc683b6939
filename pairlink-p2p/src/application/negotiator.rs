use crate::application::liveness::RunToken;
use crate::domain::MediaStream;
use crate::infrastructure::engine::{EngineEvent, NegotiationEngine};
use crate::infrastructure::error::EngineError;
use crate::infrastructure::relay::{Topic, TopicEvent};
use pairlink_core::{
    Handshake, HandshakeOutput, HandshakePhase, HandshakeStep, PairId, Pairing, ParticipantId,
    Role, SessionError, SignalingMessage,
};
use serde_json::Value;

/// What the negotiator reports back to the controller
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiatorEvent {
    /// Both participants are on the pair topic
    Activated,
    RemoteMediaAttached,
    Diagnostic(SessionError),
    /// Pair topic released and engine closed; `None` for an orderly close
    Terminated(Option<SessionError>),
}

enum StepOutcome {
    Done,
    /// The run was stopped while the engine call was in flight
    Cancelled,
}

/// Drives the handshake for one pair over its pair topic
///
/// Owns the pair-topic subscription and the engine. The media stream is lent
/// and never stopped here. Engine calls are awaited one at a time, in the
/// order the handshake emits them; a result that resolves after the run went
/// stale is dropped and the pair is released.
pub struct Negotiator<T: Topic, E: NegotiationEngine> {
    handshake: Handshake,
    topic: T,
    engine: E,
    media: MediaStream,
    run: RunToken,
    media_reported: bool,
    released: bool,
}

impl<T: Topic, E: NegotiationEngine> Negotiator<T, E> {
    /// Start negotiating on an already subscribed pair topic
    pub fn new(
        local_id: ParticipantId,
        pairing: Pairing,
        topic: T,
        engine: E,
        media: MediaStream,
        run: RunToken,
    ) -> Self {
        tracing::info!(
            "🤝 Negotiating pair {} as {} on '{}'",
            pairing.pair_id,
            pairing.role,
            topic.name()
        );
        let mut handshake = Handshake::new(local_id, pairing);
        handshake.opened();
        Self {
            handshake,
            topic,
            engine,
            media,
            run,
            media_reported: false,
            released: false,
        }
    }

    pub fn pair_id(&self) -> &PairId {
        self.handshake.pair_id()
    }

    pub fn role(&self) -> Role {
        self.handshake.role()
    }

    pub fn peer(&self) -> &ParticipantId {
        self.handshake.peer()
    }

    pub fn phase(&self) -> HandshakePhase {
        self.handshake.phase()
    }

    pub fn is_terminated(&self) -> bool {
        self.handshake.is_terminated()
    }

    /// One dispatch pass over pair-topic and engine events
    pub async fn poll(&mut self) -> Vec<NegotiatorEvent> {
        let mut events = Vec::new();
        if self.released {
            return events;
        }
        if self.run.is_stale() {
            self.cancel().await;
            return events;
        }

        for topic_event in self.topic.poll_events() {
            let outputs = match topic_event {
                TopicEvent::Members(snapshot) => self.handshake.on_members(&snapshot),
                TopicEvent::MemberJoined(id) => self.handshake.on_member_joined(&id),
                TopicEvent::MemberLeft(id) => self.handshake.on_member_left(&id),
                TopicEvent::Data { from, payload } => self.handshake.on_data(&from, payload),
                TopicEvent::Closed(reason) => self
                    .handshake
                    .on_transport_failure(format!("pair topic closed: {}", reason)),
            };
            self.execute(outputs, &mut events).await;
            if self.released {
                return events;
            }
        }

        for engine_event in self.engine.poll_events() {
            let outputs = match engine_event {
                EngineEvent::LocalCandidate(candidate) => {
                    self.handshake.on_local_candidate(candidate)
                }
                EngineEvent::NegotiationNeeded => self.handshake.on_negotiation_needed(),
                EngineEvent::RemoteMediaAttached => {
                    if !self.media_reported {
                        self.media_reported = true;
                        tracing::info!("📺 Remote media attached for pair {}", self.pair_id());
                        events.push(NegotiatorEvent::RemoteMediaAttached);
                    }
                    Vec::new()
                }
                EngineEvent::ConnectionFailed(reason) => {
                    self.handshake.on_transport_failure(reason)
                }
            };
            self.execute(outputs, &mut events).await;
            if self.released {
                break;
            }
        }

        events
    }

    /// Apply the lobby's crossed-proposal decision
    pub fn resolve_crossed(&mut self, yielded: bool) {
        let outputs = self.handshake.resolve_crossed(yielded);
        debug_assert!(outputs.is_empty());
    }

    /// Close the engine and leave the pair topic; idempotent
    pub async fn close(&mut self) {
        let outputs = self.handshake.stop();
        let mut events = Vec::new();
        self.execute(outputs, &mut events).await;
        self.release().await;
    }

    async fn execute(&mut self, outputs: Vec<HandshakeOutput>, events: &mut Vec<NegotiatorEvent>) {
        for output in outputs {
            if self.run.is_stale() {
                self.cancel().await;
                return;
            }
            match output {
                HandshakeOutput::Activated => events.push(NegotiatorEvent::Activated),
                HandshakeOutput::Diagnostic(err) => events.push(NegotiatorEvent::Diagnostic(err)),
                HandshakeOutput::Terminated(cause) => {
                    self.release().await;
                    events.push(NegotiatorEvent::Terminated(cause));
                    return;
                }
                HandshakeOutput::Step(step) => match self.run_step(step).await {
                    Ok(StepOutcome::Done) => {}
                    Ok(StepOutcome::Cancelled) => {
                        self.cancel().await;
                        return;
                    }
                    Err(err) if err.is_fatal() => {
                        tracing::error!("❌ Handshake step failed: {}", err);
                        self.handshake.fail(err.clone());
                        self.release().await;
                        events.push(NegotiatorEvent::Terminated(Some(err)));
                        return;
                    }
                    Err(err) => {
                        tracing::warn!("⚠️ {}", err);
                        events.push(NegotiatorEvent::Diagnostic(err));
                    }
                },
            }
        }
    }

    async fn run_step(&mut self, step: HandshakeStep) -> Result<StepOutcome, SessionError> {
        match step {
            HandshakeStep::AttachMedia => {
                let attached = self.engine.attach_local_media(&self.media).await;
                Ok(outcome(self.settle(attached, transport_failure)?))
            }
            HandshakeStep::SendOffer => {
                let created = self.engine.create_offer().await;
                let Some(offer) = self.settle(created, transport_failure)? else {
                    return Ok(StepOutcome::Cancelled);
                };
                tracing::debug!("📤 Sending offer");
                self.send(SignalingMessage::Offer { offer })
            }
            HandshakeStep::ApplyOffer(offer) => {
                tracing::debug!("📥 Applying remote offer");
                let applied = self.engine.accept_offer(offer).await;
                Ok(outcome(self.settle(applied, malformed_description)?))
            }
            HandshakeStep::SendAnswer => {
                let created = self.engine.create_answer().await;
                let Some(answer) = self.settle(created, transport_failure)? else {
                    return Ok(StepOutcome::Cancelled);
                };
                tracing::debug!("📤 Sending answer");
                self.send(SignalingMessage::Answer { answer })
            }
            HandshakeStep::ApplyAnswer(answer) => {
                tracing::debug!("📥 Applying remote answer");
                let applied = self.engine.accept_answer(answer).await;
                Ok(outcome(self.settle(applied, malformed_description)?))
            }
            HandshakeStep::AddCandidate(candidate) => {
                let added = self.engine.add_remote_candidate(candidate).await;
                Ok(outcome(self.settle(added, malformed_candidate)?))
            }
            HandshakeStep::SendCandidate(candidate) => {
                self.send(SignalingMessage::Candidate { candidate })
            }
        }
    }

    /// Engine result, or `None` when the run went stale while it was pending
    fn settle<V>(
        &self,
        result: Result<V, EngineError>,
        map: fn(EngineError) -> SessionError,
    ) -> Result<Option<V>, SessionError> {
        if self.run.is_stale() {
            return Ok(None);
        }
        result.map(Some).map_err(map)
    }

    fn send(&mut self, message: SignalingMessage) -> Result<StepOutcome, SessionError> {
        let payload: Value = message
            .to_value()
            .map_err(|e| SessionError::NegotiationTransportFailure(e.to_string()))?;
        self.topic
            .publish(payload)
            .map_err(|e| SessionError::NegotiationTransportFailure(e.to_string()))?;
        Ok(StepOutcome::Done)
    }

    async fn cancel(&mut self) {
        if !self.released {
            tracing::info!("🛑 Stop requested, abandoning pair {}", self.pair_id());
            self.release().await;
        }
    }

    async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.engine.close().await;
        self.topic.unsubscribe();
        tracing::debug!("Released pair {}", self.pair_id());
    }
}

fn outcome<V>(settled: Option<V>) -> StepOutcome {
    match settled {
        Some(_) => StepOutcome::Done,
        None => StepOutcome::Cancelled,
    }
}

fn transport_failure(e: EngineError) -> SessionError {
    SessionError::NegotiationTransportFailure(e.to_string())
}

fn malformed_description(e: EngineError) -> SessionError {
    SessionError::MalformedHandshakeMessage(e.to_string())
}

fn malformed_candidate(e: EngineError) -> SessionError {
    SessionError::MalformedCandidate(e.to_string())
}
