#![allow(dead_code)]

use pairlink_p2p::infrastructure::{MemoryConnection, MemoryTopic};
use pairlink_p2p::{
    MemoryRelayHub, Relay, RelayConnection, SessionConfig, SessionEvent, SimulatedEngineFactory,
    SimulatedSession, SyntheticMediaSource, Topic, TopicEvent,
};
use serde_json::{json, Value};

pub const LOBBY: &str = "observable-match";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_config(seed: u64) -> SessionConfig {
    SessionConfig::default()
        .with_poll_interval(5)
        .with_rng_seed(seed)
}

/// A controller plus handles on its media source and engine factory
pub struct Participant {
    pub session: SimulatedSession,
    pub media: SyntheticMediaSource,
    pub engines: SimulatedEngineFactory,
    events: Vec<SessionEvent>,
}

impl Participant {
    pub fn new(hub: &MemoryRelayHub, id: &str) -> Self {
        Self::with_parts(
            hub,
            id,
            test_config(7),
            SyntheticMediaSource::new(),
            SimulatedEngineFactory::default(),
        )
    }

    pub fn with_parts(
        hub: &MemoryRelayHub,
        id: &str,
        config: SessionConfig,
        media: SyntheticMediaSource,
        engines: SimulatedEngineFactory,
    ) -> Self {
        let session = SimulatedSession::new(
            config,
            hub.relay_with_id(id),
            media.clone(),
            engines.clone(),
        );
        Self {
            session,
            media,
            engines,
            events: Vec::new(),
        }
    }

    pub async fn poll(&mut self) -> usize {
        let processed = self.session.poll().await;
        self.events.extend(self.session.drain_events());
        processed
    }

    /// Every event seen so far
    pub fn events(&mut self) -> &[SessionEvent] {
        self.events.extend(self.session.drain_events());
        &self.events
    }

    pub fn saw(&mut self, event: &SessionEvent) -> bool {
        self.events().contains(event)
    }

    pub fn paired(&mut self) -> Option<SessionEvent> {
        self.events()
            .iter()
            .find(|e| matches!(e, SessionEvent::Paired { .. }))
            .cloned()
    }
}

/// Poll every participant `rounds` times, in order
pub async fn pump(participants: &mut [&mut Participant], rounds: usize) {
    for _ in 0..rounds {
        for participant in participants.iter_mut() {
            participant.poll().await;
        }
    }
}

/// Hand-driven relay client for scripting a misbehaving or partial peer
pub struct ScriptedPeer {
    pub connection: MemoryConnection,
}

impl ScriptedPeer {
    pub async fn connect(hub: &MemoryRelayHub, id: &str) -> Self {
        let connection = hub
            .relay_with_id(id)
            .connect()
            .await
            .expect("scripted peer should connect");
        Self { connection }
    }

    pub async fn subscribe(&mut self, topic: &str) -> MemoryTopic {
        self.connection
            .subscribe(topic)
            .await
            .expect("scripted peer should subscribe")
    }
}

pub fn publish(topic: &mut MemoryTopic, payload: Value) {
    topic.publish(payload).expect("publish should succeed");
}

pub fn data_payloads(topic: &mut MemoryTopic) -> Vec<Value> {
    topic
        .poll_events()
        .into_iter()
        .filter_map(|event| match event {
            TopicEvent::Data { payload, .. } => Some(payload),
            _ => None,
        })
        .collect()
}

pub fn offer_with_audio() -> Value {
    json!({
        "type": "offer",
        "offer": {
            "type": "offer",
            "sdp": "v=0\r\no=peer 1 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=mid:0\r\n",
        },
    })
}

pub fn candidate(n: u32) -> Value {
    json!({
        "type": "candidate",
        "candidate": {
            "candidate": format!("candidate:{} 1 udp 2130706431 10.0.0.2 6000{} typ host", n, n),
            "sdpMid": "0",
            "sdpMLineIndex": 0,
        },
    })
}
