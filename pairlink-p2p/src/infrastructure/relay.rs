use crate::infrastructure::error::RelayResult;
use async_trait::async_trait;
use pairlink_core::ParticipantId;
use serde_json::Value;

/// Events observed on one topic subscription
#[derive(Debug, Clone, PartialEq)]
pub enum TopicEvent {
    /// Membership snapshot, delivered once to the subscriber when the topic opens
    Members(Vec<ParticipantId>),
    MemberJoined(ParticipantId),
    MemberLeft(ParticipantId),
    /// Published payload; the publisher receives its own messages too
    Data { from: ParticipantId, payload: Value },
    /// The relay dropped the subscription
    Closed(String),
}

/// Entry point of a pub/sub relay (allows swapping the substrate in tests)
#[async_trait]
pub trait Relay: Send + Sync {
    type Connection: RelayConnection;

    async fn connect(&self) -> RelayResult<Self::Connection>;
}

/// One participant's connection to the relay
#[async_trait]
pub trait RelayConnection: Send {
    type Topic: Topic;

    /// Identity assigned to this connection
    fn local_id(&self) -> &ParticipantId;

    /// Resolves once the relay acknowledged the subscription
    async fn subscribe(&mut self, topic: &str) -> RelayResult<Self::Topic>;

    /// Disconnect; idempotent
    fn close(&mut self);
}

/// Handle to a subscribed topic
pub trait Topic: Send {
    fn name(&self) -> &str;

    fn publish(&mut self, payload: Value) -> RelayResult<()>;

    /// Drain everything received since the last call, in arrival order
    fn poll_events(&mut self) -> Vec<TopicEvent>;

    /// Leave the topic; idempotent
    fn unsubscribe(&mut self);
}
