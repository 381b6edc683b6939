use crate::domain::{IceServer, MediaStream};
use crate::infrastructure::error::EngineResult;
use async_trait::async_trait;
use serde_json::Value;

/// Asynchronous notifications from a negotiation engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Locally discovered ICE candidate, to be sent to the peer
    LocalCandidate(Value),
    /// The local side wants a new offer/answer round
    NegotiationNeeded,
    /// Media from the peer is flowing
    RemoteMediaAttached,
    ConnectionFailed(String),
}

/// Peer-connection engine for one pair
///
/// Description blobs are opaque JSON. `create_offer` and `create_answer`
/// apply the description locally before returning it.
#[async_trait]
pub trait NegotiationEngine: Send {
    async fn attach_local_media(&mut self, stream: &MediaStream) -> EngineResult<()>;

    async fn create_offer(&mut self) -> EngineResult<Value>;

    async fn accept_offer(&mut self, offer: Value) -> EngineResult<()>;

    async fn create_answer(&mut self) -> EngineResult<Value>;

    async fn accept_answer(&mut self, answer: Value) -> EngineResult<()>;

    async fn add_remote_candidate(&mut self, candidate: Value) -> EngineResult<()>;

    fn poll_events(&mut self) -> Vec<EngineEvent>;

    async fn close(&mut self);
}

/// Creates one engine per pairing
#[async_trait]
pub trait EngineFactory: Send + Sync {
    type Engine: NegotiationEngine;

    async fn create(&self, ice_servers: &[IceServer]) -> EngineResult<Self::Engine>;
}
