use crate::infrastructure::error::{RelayError, RelayResult};
use crate::infrastructure::relay::{Relay, RelayConnection, Topic, TopicEvent};
use async_trait::async_trait;
use pairlink_core::ParticipantId;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

type Inbox = Arc<Mutex<VecDeque<TopicEvent>>>;

struct Subscriber {
    participant: ParticipantId,
    inbox: Inbox,
}

#[derive(Default)]
struct HubState {
    topics: HashMap<String, Vec<Subscriber>>,
    history: HashMap<String, Vec<(ParticipantId, Value)>>,
    connected: HashSet<ParticipantId>,
    refuse_connections: Option<String>,
    refused_topics: HashMap<String, String>,
    shut_down: bool,
}

impl HubState {
    fn members(&self, topic: &str) -> Vec<ParticipantId> {
        let mut members: Vec<ParticipantId> = self
            .topics
            .get(topic)
            .map(|subs| subs.iter().map(|s| s.participant.clone()).collect())
            .unwrap_or_default();
        members.sort();
        members.dedup();
        members
    }

    fn remove_subscriber(&mut self, topic: &str, participant: &ParticipantId) -> bool {
        let Some(subs) = self.topics.get_mut(topic) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| s.participant != *participant);
        let removed = subs.len() != before;

        if removed {
            for sub in subs.iter() {
                sub.inbox
                    .lock()
                    .push_back(TopicEvent::MemberLeft(participant.clone()));
            }
        }
        if subs.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }
}

/// In-process relay shared by every participant of a test or demo
///
/// Delivery is synchronous and FIFO per subscriber. A new subscriber gets a
/// membership snapshot (including itself); existing subscribers get a join
/// notification. Published messages reach every subscriber, publisher included.
#[derive(Clone, Default)]
pub struct MemoryRelayHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryRelayHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector that assigns a fresh id per connection
    pub fn relay(&self) -> MemoryRelay {
        MemoryRelay {
            hub: self.clone(),
            pinned_id: None,
        }
    }

    /// Connector whose connections always use `id`
    pub fn relay_with_id(&self, id: impl Into<ParticipantId>) -> MemoryRelay {
        MemoryRelay {
            hub: self.clone(),
            pinned_id: Some(id.into()),
        }
    }

    /// Refuse new connections until [`accept_connections`](Self::accept_connections)
    pub fn refuse_connections(&self, reason: impl Into<String>) {
        self.state.lock().refuse_connections = Some(reason.into());
    }

    pub fn accept_connections(&self) {
        self.state.lock().refuse_connections = None;
    }

    /// Refuse subscriptions to `topic`
    pub fn refuse_topic(&self, topic: impl Into<String>, reason: impl Into<String>) {
        self.state
            .lock()
            .refused_topics
            .insert(topic.into(), reason.into());
    }

    /// Drop every subscription with a `Closed` event and refuse further use
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        tracing::info!("🛑 Memory relay shutting down");
        for (_, subs) in state.topics.drain() {
            for sub in subs {
                sub.inbox
                    .lock()
                    .push_back(TopicEvent::Closed("relay shut down".to_string()));
            }
        }
        state.connected.clear();
        state.shut_down = true;
    }

    /// Current subscribers of `topic`, sorted
    pub fn members(&self, topic: &str) -> Vec<ParticipantId> {
        self.state.lock().members(topic)
    }

    /// Everything ever published on `topic`
    pub fn history(&self, topic: &str) -> Vec<(ParticipantId, Value)> {
        self.state
            .lock()
            .history
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_connected(&self, id: &ParticipantId) -> bool {
        self.state.lock().connected.contains(id)
    }

    pub fn connection_count(&self) -> usize {
        self.state.lock().connected.len()
    }
}

/// [`Relay`] connector bound to a [`MemoryRelayHub`]
#[derive(Clone)]
pub struct MemoryRelay {
    hub: MemoryRelayHub,
    pinned_id: Option<ParticipantId>,
}

impl MemoryRelay {
    pub fn hub(&self) -> &MemoryRelayHub {
        &self.hub
    }
}

#[async_trait]
impl Relay for MemoryRelay {
    type Connection = MemoryConnection;

    async fn connect(&self) -> RelayResult<MemoryConnection> {
        tokio::task::yield_now().await;

        let mut state = self.hub.state.lock();
        if state.shut_down {
            return Err(RelayError::ConnectionFailed("relay shut down".to_string()));
        }
        if let Some(reason) = &state.refuse_connections {
            return Err(RelayError::ConnectionFailed(reason.clone()));
        }

        let local_id = self
            .pinned_id
            .clone()
            .unwrap_or_else(|| ParticipantId::new(Uuid::new_v4().to_string()));
        state.connected.insert(local_id.clone());

        tracing::debug!("🔌 Memory relay: {} connected", local_id.short());

        Ok(MemoryConnection {
            hub: self.hub.clone(),
            local_id,
            topics: Vec::new(),
            closed: false,
        })
    }
}

pub struct MemoryConnection {
    hub: MemoryRelayHub,
    local_id: ParticipantId,
    topics: Vec<String>,
    closed: bool,
}

#[async_trait]
impl RelayConnection for MemoryConnection {
    type Topic = MemoryTopic;

    fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    async fn subscribe(&mut self, topic: &str) -> RelayResult<MemoryTopic> {
        tokio::task::yield_now().await;

        let subscribe_error = |reason: &str| RelayError::SubscribeFailed {
            topic: topic.to_string(),
            reason: reason.to_string(),
        };

        if self.closed {
            return Err(subscribe_error("connection closed"));
        }

        let mut state = self.hub.state.lock();
        if state.shut_down {
            return Err(subscribe_error("relay shut down"));
        }
        if let Some(reason) = state.refused_topics.get(topic) {
            return Err(subscribe_error(reason.as_str()));
        }

        let inbox: Inbox = Arc::new(Mutex::new(VecDeque::new()));
        let subs = state.topics.entry(topic.to_string()).or_default();
        for sub in subs.iter() {
            sub.inbox
                .lock()
                .push_back(TopicEvent::MemberJoined(self.local_id.clone()));
        }
        subs.push(Subscriber {
            participant: self.local_id.clone(),
            inbox: inbox.clone(),
        });

        let snapshot = state.members(topic);
        inbox.lock().push_back(TopicEvent::Members(snapshot));

        if !self.topics.iter().any(|t| t == topic) {
            self.topics.push(topic.to_string());
        }

        tracing::debug!("📥 {} subscribed to '{}'", self.local_id.short(), topic);

        Ok(MemoryTopic {
            hub: self.hub.clone(),
            name: topic.to_string(),
            local_id: self.local_id.clone(),
            inbox,
            subscribed: true,
        })
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut state = self.hub.state.lock();
        for topic in self.topics.drain(..) {
            state.remove_subscriber(&topic, &self.local_id);
        }
        state.connected.remove(&self.local_id);

        tracing::debug!("🔌 Memory relay: {} disconnected", self.local_id.short());
    }
}

pub struct MemoryTopic {
    hub: MemoryRelayHub,
    name: String,
    local_id: ParticipantId,
    inbox: Inbox,
    subscribed: bool,
}

impl Topic for MemoryTopic {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&mut self, payload: Value) -> RelayResult<()> {
        if !self.subscribed {
            return Err(RelayError::PublishFailed(format!(
                "not subscribed to '{}'",
                self.name
            )));
        }

        let mut state = self.hub.state.lock();
        if state.shut_down {
            return Err(RelayError::Closed);
        }

        if let Some(subs) = state.topics.get(&self.name) {
            for sub in subs {
                sub.inbox.lock().push_back(TopicEvent::Data {
                    from: self.local_id.clone(),
                    payload: payload.clone(),
                });
            }
        }
        state
            .history
            .entry(self.name.clone())
            .or_default()
            .push((self.local_id.clone(), payload));

        Ok(())
    }

    fn poll_events(&mut self) -> Vec<TopicEvent> {
        self.inbox.lock().drain(..).collect()
    }

    fn unsubscribe(&mut self) {
        if !self.subscribed {
            return;
        }
        self.subscribed = false;
        self.hub
            .state
            .lock()
            .remove_subscriber(&self.name, &self.local_id);
        self.inbox.lock().clear();

        tracing::debug!("📤 {} left '{}'", self.local_id.short(), self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_snapshot_goes_to_subscriber_and_join_to_others() {
        let hub = MemoryRelayHub::new();
        let mut x = hub.relay_with_id("X").connect().await.unwrap();
        let mut y = hub.relay_with_id("Y").connect().await.unwrap();

        let mut tx = x.subscribe("lobby").await.unwrap();
        assert_eq!(
            tx.poll_events(),
            vec![TopicEvent::Members(vec![ParticipantId::new("X")])]
        );

        let mut ty = y.subscribe("lobby").await.unwrap();
        assert_eq!(
            ty.poll_events(),
            vec![TopicEvent::Members(vec![
                ParticipantId::new("X"),
                ParticipantId::new("Y")
            ])]
        );
        assert_eq!(
            tx.poll_events(),
            vec![TopicEvent::MemberJoined(ParticipantId::new("Y"))]
        );
    }

    #[tokio::test]
    async fn test_publish_is_self_visible() {
        let hub = MemoryRelayHub::new();
        let mut x = hub.relay_with_id("X").connect().await.unwrap();
        let mut topic = x.subscribe("t").await.unwrap();
        topic.poll_events();

        topic.publish(json!({"n": 1})).unwrap();
        assert_eq!(
            topic.poll_events(),
            vec![TopicEvent::Data {
                from: ParticipantId::new("X"),
                payload: json!({"n": 1})
            }]
        );
        assert_eq!(hub.history("t").len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_and_close_notify_others() {
        let hub = MemoryRelayHub::new();
        let mut x = hub.relay_with_id("X").connect().await.unwrap();
        let mut y = hub.relay_with_id("Y").connect().await.unwrap();
        let mut tx = x.subscribe("a").await.unwrap();
        let mut ty = y.subscribe("a").await.unwrap();
        let _ = y.subscribe("b").await.unwrap();
        tx.poll_events();

        ty.unsubscribe();
        ty.unsubscribe();
        assert_eq!(
            tx.poll_events(),
            vec![TopicEvent::MemberLeft(ParticipantId::new("Y"))]
        );
        assert!(ty.publish(json!(1)).is_err());

        y.close();
        y.close();
        assert!(hub.members("b").is_empty());
        assert!(!hub.is_connected(&ParticipantId::new("Y")));
        assert!(tx.poll_events().is_empty());
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let hub = MemoryRelayHub::new();
        hub.refuse_connections("maintenance");
        assert!(matches!(
            hub.relay().connect().await,
            Err(RelayError::ConnectionFailed(_))
        ));
        hub.accept_connections();

        let mut conn = hub.relay().connect().await.unwrap();
        hub.refuse_topic("lobby", "full");
        assert!(matches!(
            conn.subscribe("lobby").await,
            Err(RelayError::SubscribeFailed { .. })
        ));

        let mut other = conn.subscribe("other").await.unwrap();
        other.poll_events();
        hub.shutdown();
        assert_eq!(
            other.poll_events(),
            vec![TopicEvent::Closed("relay shut down".to_string())]
        );
        assert!(hub.relay().connect().await.is_err());
    }

    #[tokio::test]
    async fn test_fresh_ids_are_unique() {
        let hub = MemoryRelayHub::new();
        let a = hub.relay().connect().await.unwrap();
        let b = hub.relay().connect().await.unwrap();
        assert_ne!(a.local_id(), b.local_id());
        assert_eq!(hub.connection_count(), 2);
    }
}
