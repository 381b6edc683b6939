use cucumber::World;
use pairlink_core::{Matcher, SessionError, SessionStatus};
use pairlink_p2p::infrastructure::{EngineCall, MemoryConnection, MemoryTopic};
use pairlink_p2p::{
    MemoryRelayHub, Relay, RelayConnection, SessionConfig, SessionEvent, SimulatedEngineFactory,
    SimulatedSession, SyntheticMediaSource, Topic,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

pub const LOBBY: &str = "observable-match";

/// Fast polling and a fixed partner-selection seed
pub fn scenario_config() -> SessionConfig {
    SessionConfig::default()
        .with_poll_interval(5)
        .with_rng_seed(3)
}

/// One session under test with handles on its adapters
pub struct Participant {
    pub session: SimulatedSession,
    pub media: SyntheticMediaSource,
    pub engines: SimulatedEngineFactory,
    pub events: Vec<SessionEvent>,
}

impl Participant {
    pub fn new(
        hub: &MemoryRelayHub,
        name: &str,
        config: SessionConfig,
        media: SyntheticMediaSource,
        engines: SimulatedEngineFactory,
    ) -> Self {
        Self {
            session: SimulatedSession::new(
                config,
                hub.relay_with_id(name),
                media.clone(),
                engines.clone(),
            ),
            media,
            engines,
            events: Vec::new(),
        }
    }

    pub async fn poll(&mut self) {
        self.session.poll().await;
        self.events.extend(self.session.drain_events());
    }

    pub fn saw(&self, event: &SessionEvent) -> bool {
        self.events.contains(event)
    }

    pub fn status(&self) -> &SessionStatus {
        self.session.status()
    }

    /// Engine calls of the first (and only) engine this participant created
    pub fn engine_calls(&self) -> Vec<EngineCall> {
        self.engines
            .call_logs()
            .into_iter()
            .next()
            .unwrap_or_default()
    }
}

/// Relay client driven directly by steps
pub struct ScriptedPeer {
    pub connection: MemoryConnection,
    pub topics: HashMap<String, MemoryTopic>,
}

impl ScriptedPeer {
    pub fn topic(&mut self, name: &str) -> &mut MemoryTopic {
        self.topics
            .get_mut(name)
            .unwrap_or_else(|| panic!("scripted peer is not subscribed to '{}'", name))
    }

    pub fn publish(&mut self, topic: &str, payload: Value) {
        self.topic(topic)
            .publish(payload)
            .expect("scripted publish should succeed");
    }
}

#[derive(World, Default)]
pub struct PairingWorld {
    /// In-process relay shared by every participant
    pub hub: MemoryRelayHub,

    /// Sessions under test, by participant id
    pub participants: HashMap<String, Participant>,

    /// Start order, used when driving all sessions
    pub order: Vec<String>,

    pub scripted: HashMap<String, ScriptedPeer>,

    /// Last error returned by `start`
    pub last_error: Option<SessionError>,

    /// Pure matcher for protocol-level scenarios
    pub matcher: Option<Matcher>,
}

impl fmt::Debug for PairingWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairingWorld")
            .field("participants", &self.order)
            .field("scripted", &self.scripted.keys().collect::<Vec<_>>())
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl PairingWorld {
    /// Register a participant with custom adapters (before it starts)
    pub fn add_participant(
        &mut self,
        name: &str,
        config: SessionConfig,
        media: SyntheticMediaSource,
        engines: SimulatedEngineFactory,
    ) {
        let participant = Participant::new(&self.hub, name, config, media, engines);
        if self
            .participants
            .insert(name.to_string(), participant)
            .is_none()
        {
            self.order.push(name.to_string());
        }
    }

    /// Participant by name, created with default adapters on first use
    pub fn participant(&mut self, name: &str) -> &mut Participant {
        if !self.participants.contains_key(name) {
            self.add_participant(
                name,
                scenario_config(),
                SyntheticMediaSource::new(),
                SimulatedEngineFactory::default(),
            );
        }
        self.participants
            .get_mut(name)
            .unwrap_or_else(|| panic!("participant '{}' missing", name))
    }

    pub async fn start(&mut self, name: &str) {
        let result = self.participant(name).session.start().await;
        let participant = self.participant(name);
        participant
            .events
            .extend(participant.session.drain_events());
        self.last_error = result.err();
    }

    /// Poll every participant in start order
    pub async fn run_rounds(&mut self, rounds: usize) {
        for _ in 0..rounds {
            for name in self.order.clone() {
                self.participant(&name).poll().await;
            }
        }
    }

    pub async fn add_scripted_peer(&mut self, name: &str) {
        let connection = self
            .hub
            .relay_with_id(name)
            .connect()
            .await
            .expect("scripted peer should connect");
        self.scripted.insert(
            name.to_string(),
            ScriptedPeer {
                connection,
                topics: HashMap::new(),
            },
        );
    }

    pub async fn scripted_subscribe(&mut self, name: &str, topic: &str) {
        let peer = self
            .scripted
            .get_mut(name)
            .unwrap_or_else(|| panic!("no scripted peer '{}'", name));
        let handle = peer
            .connection
            .subscribe(topic)
            .await
            .expect("scripted peer should subscribe");
        peer.topics.insert(topic.to_string(), handle);
    }

    pub fn scripted_peer(&mut self, name: &str) -> &mut ScriptedPeer {
        self.scripted
            .get_mut(name)
            .unwrap_or_else(|| panic!("no scripted peer '{}'", name))
    }
}

/// Variant name of a session error, as written in feature files
pub fn error_kind(err: &SessionError) -> &'static str {
    match err {
        SessionError::MediaAccessDenied(_) => "MediaAccessDenied",
        SessionError::SignalingConnectError(_) => "SignalingConnectError",
        SessionError::TopicOpenError { .. } => "TopicOpenError",
        SessionError::MalformedHandshakeMessage(_) => "MalformedHandshakeMessage",
        SessionError::MalformedCandidate(_) => "MalformedCandidate",
        SessionError::NegotiationTransportFailure(_) => "NegotiationTransportFailure",
    }
}
