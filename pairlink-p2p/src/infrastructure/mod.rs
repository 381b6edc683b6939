pub mod engine;
pub mod error;
#[cfg(feature = "matchbox")]
pub mod matchbox_relay;
pub mod media_source;
pub mod memory_relay;
pub mod relay;
pub mod simulated_engine;
#[cfg(feature = "webrtc")]
pub mod webrtc_engine;

pub use engine::{EngineEvent, EngineFactory, NegotiationEngine};
pub use error::{EngineError, MediaError, RelayError};
#[cfg(feature = "matchbox")]
pub use matchbox_relay::{MatchboxConnection, MatchboxRelay, MatchboxTopic};
pub use media_source::{MediaSource, SyntheticMediaSource};
pub use memory_relay::{MemoryConnection, MemoryRelay, MemoryRelayHub, MemoryTopic};
pub use relay::{Relay, RelayConnection, Topic, TopicEvent};
pub use simulated_engine::{
    EngineCall, SimulatedEngine, SimulatedEngineFactory, SimulatedEngineOptions,
};
#[cfg(feature = "webrtc")]
pub use webrtc_engine::{WebRtcEngine, WebRtcEngineFactory};
