// Domain layer (media and ICE configuration)
pub mod domain;

// Application layer (session lifecycle)
pub mod application;

// Infrastructure layer (relay, engine and media adapters)
pub mod infrastructure;

// Re-exports for convenience
pub use application::{
    Negotiator, NegotiatorEvent, RunToken, SessionConfig, SessionController, SessionEvent,
    SessionHandle, SessionMode,
};
pub use domain::{IceServer, MediaConstraints, MediaStream, MediaTrack, TrackKind};
pub use infrastructure::{
    EngineError, EngineEvent, EngineFactory, MediaError, MediaSource, MemoryRelay,
    MemoryRelayHub, NegotiationEngine, Relay, RelayConnection, RelayError, SimulatedEngine,
    SimulatedEngineFactory, SimulatedEngineOptions, SyntheticMediaSource, Topic, TopicEvent,
};
#[cfg(feature = "matchbox")]
pub use infrastructure::MatchboxRelay;
#[cfg(feature = "webrtc")]
pub use infrastructure::WebRtcEngineFactory;
pub use pairlink_core::{PairId, ParticipantId, Role, SessionError, SessionStatus};

/// Controller wired to the in-process relay and simulated engine
pub type SimulatedSession =
    SessionController<MemoryRelay, SyntheticMediaSource, SimulatedEngineFactory>;
