use crate::domain::IceServer;
use crate::infrastructure::error::{RelayError, RelayResult};
use crate::infrastructure::relay::{Relay, RelayConnection, Topic, TopicEvent};
use async_trait::async_trait;
use matchbox_socket::{PeerId, PeerState, RtcIceServerConfig, WebRtcSocket, WebRtcSocketBuilder};
use pairlink_core::ParticipantId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

const PEER_ID_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_STEP: Duration = Duration::from_millis(10);

/// Frames exchanged between topic members over the matchbox data channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Frame {
    /// Introduces the sender's participant id to a newly connected peer
    Hello { participant: ParticipantId },
    Data { from: ParticipantId, payload: Value },
}

impl Frame {
    fn encode(&self) -> RelayResult<Box<[u8]>> {
        Ok(serde_json::to_vec(self)?.into_boxed_slice())
    }

    fn decode(packet: &[u8]) -> RelayResult<Self> {
        Ok(serde_json::from_slice(packet)?)
    }
}

/// Relay over a matchbox signalling server
///
/// Each topic is a matchbox room (`<server>/<topic>`) with its own socket.
/// Matchbox assigns ids per socket, so every member announces its
/// connection-wide participant id with a hello frame.
#[derive(Debug, Clone)]
pub struct MatchboxRelay {
    server: String,
    ice_servers: Vec<IceServer>,
    settle: Duration,
}

impl MatchboxRelay {
    pub fn new(server: impl Into<String>, ice_servers: Vec<IceServer>) -> Self {
        Self {
            server: server.into(),
            ice_servers,
            settle: Duration::from_millis(1500),
        }
    }

    /// How long to collect hello frames before delivering the membership snapshot
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

#[async_trait]
impl Relay for MatchboxRelay {
    type Connection = MatchboxConnection;

    async fn connect(&self) -> RelayResult<MatchboxConnection> {
        let server = self.server.trim_end_matches('/');
        if !(server.starts_with("ws://") || server.starts_with("wss://")) {
            return Err(RelayError::ConnectionFailed(format!(
                "signalling server must be a ws:// or wss:// URL, got '{}'",
                self.server
            )));
        }

        let local_id = ParticipantId::new(Uuid::new_v4().to_string());
        tracing::info!("Using signalling server: {}", server);
        tracing::info!("Local participant id: {}", local_id);

        Ok(MatchboxConnection {
            server: server.to_string(),
            ice_servers: self.ice_servers.clone(),
            settle: self.settle,
            local_id,
            rooms: Vec::new(),
            closed: false,
        })
    }
}

pub struct MatchboxConnection {
    server: String,
    ice_servers: Vec<IceServer>,
    settle: Duration,
    local_id: ParticipantId,
    rooms: Vec<AbortHandle>,
    closed: bool,
}

#[async_trait]
impl RelayConnection for MatchboxConnection {
    type Topic = MatchboxTopic;

    fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    async fn subscribe(&mut self, topic: &str) -> RelayResult<MatchboxTopic> {
        if self.closed {
            return Err(RelayError::SubscribeFailed {
                topic: topic.to_string(),
                reason: "connection closed".to_string(),
            });
        }

        let room_url = format!("{}/{}", self.server, topic);
        tracing::info!("Joining room {}", room_url);
        for (i, server) in self.ice_servers.iter().enumerate() {
            tracing::debug!(
                "  ICE server {}: {}{}",
                i + 1,
                server.urls.join(", "),
                if server.has_credentials() { " (with auth)" } else { "" }
            );
            if server.is_turn() && !server.has_credentials() {
                tracing::warn!("⚠️ TURN server {} has no credentials", server.urls.join(", "));
            }
        }

        let (mut socket, loop_fut) = WebRtcSocketBuilder::new(room_url)
            .ice_server(build_ice_server_config(&self.ice_servers))
            .add_channel(matchbox_socket::ChannelConfig::reliable())
            .build();

        let loop_span = tracing::info_span!("matchbox::room", topic = %topic);
        let loop_handle = tokio::spawn(
            async move {
                if let Err(e) = loop_fut.await {
                    tracing::warn!("Matchbox loop ended: {:?}", e);
                }
            }
            .instrument(loop_span),
        );

        if let Err(e) = wait_for_socket_id(&mut socket, &loop_handle).await {
            loop_handle.abort();
            return Err(RelayError::SubscribeFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            });
        }

        let mut handle = MatchboxTopic {
            name: topic.to_string(),
            local_id: self.local_id.clone(),
            socket,
            loop_handle,
            peers: HashMap::new(),
            pending: VecDeque::new(),
            snapshot_sent: false,
            closed: false,
        };
        handle.settle(self.settle).await;

        self.rooms.push(handle.loop_handle.abort_handle());
        Ok(handle)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for room in self.rooms.drain(..) {
            room.abort();
        }
        tracing::info!("Disconnected from {}", self.server);
    }
}

pub struct MatchboxTopic {
    name: String,
    local_id: ParticipantId,
    socket: WebRtcSocket,
    loop_handle: JoinHandle<()>,
    /// Connected matchbox peers and the participant they introduced themselves as
    peers: HashMap<PeerId, Option<ParticipantId>>,
    pending: VecDeque<TopicEvent>,
    snapshot_sent: bool,
    closed: bool,
}

impl MatchboxTopic {
    /// Collect introductions for `window`, then queue the membership snapshot
    async fn settle(&mut self, window: Duration) {
        let deadline = Instant::now() + window;
        while Instant::now() < deadline {
            self.pump();
            tokio::time::sleep(POLL_STEP).await;
        }
        self.pump();

        let mut members: Vec<ParticipantId> = self.peers.values().flatten().cloned().collect();
        members.push(self.local_id.clone());
        members.sort();
        members.dedup();

        tracing::info!("Topic '{}' open with {} member(s)", self.name, members.len());
        self.pending.push_front(TopicEvent::Members(members));
        self.snapshot_sent = true;
    }

    /// Move socket activity into the pending queue
    fn pump(&mut self) {
        if self.closed {
            return;
        }

        for (peer, state) in self.socket.update_peers() {
            match state {
                PeerState::Connected => {
                    tracing::debug!("Room peer connected: {:?}", peer);
                    self.peers.entry(peer).or_insert(None);
                    let hello = Frame::Hello {
                        participant: self.local_id.clone(),
                    };
                    match hello.encode() {
                        Ok(packet) => self.socket.channel_mut(0).send(packet, peer),
                        Err(e) => tracing::warn!("Could not encode hello: {}", e),
                    }
                }
                PeerState::Disconnected => {
                    tracing::debug!("Room peer disconnected: {:?}", peer);
                    if let Some(Some(participant)) = self.peers.remove(&peer) {
                        self.pending.push_back(TopicEvent::MemberLeft(participant));
                    }
                }
            }
        }

        for (peer, packet) in self.socket.channel_mut(0).receive() {
            match Frame::decode(&packet) {
                Ok(Frame::Hello { participant }) => {
                    let slot = self.peers.entry(peer).or_insert(None);
                    if slot.is_none() {
                        *slot = Some(participant.clone());
                        if self.snapshot_sent {
                            self.pending.push_back(TopicEvent::MemberJoined(participant));
                        }
                    }
                }
                Ok(Frame::Data { from, payload }) => {
                    self.pending.push_back(TopicEvent::Data { from, payload });
                }
                Err(e) => tracing::debug!("Dropping undecodable frame from {:?}: {}", peer, e),
            }
        }

        if self.loop_handle.is_finished() {
            self.closed = true;
            self.pending
                .push_back(TopicEvent::Closed("signalling connection lost".to_string()));
        }
    }
}

impl Topic for MatchboxTopic {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&mut self, payload: Value) -> RelayResult<()> {
        if self.closed {
            return Err(RelayError::Closed);
        }

        let frame = Frame::Data {
            from: self.local_id.clone(),
            payload: payload.clone(),
        };
        let packet = frame.encode()?;

        let peers: Vec<PeerId> = self.socket.connected_peers().collect();
        for peer in &peers {
            self.socket.channel_mut(0).send(packet.clone(), *peer);
        }
        tracing::debug!("📤 Published on '{}' to {} peer(s)", self.name, peers.len());

        self.pending.push_back(TopicEvent::Data {
            from: self.local_id.clone(),
            payload,
        });
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<TopicEvent> {
        self.pump();
        self.pending.drain(..).collect()
    }

    fn unsubscribe(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.loop_handle.abort();
        self.pending.clear();
        tracing::info!("Left room '{}'", self.name);
    }
}

impl Drop for MatchboxTopic {
    fn drop(&mut self) {
        self.loop_handle.abort();
    }
}

/// Matchbox accepts a single ICE server entry
fn build_ice_server_config(ice_servers: &[IceServer]) -> RtcIceServerConfig {
    let Some(first) = ice_servers.first() else {
        return RtcIceServerConfig::default();
    };

    RtcIceServerConfig {
        urls: first.urls.clone(),
        username: first.username.clone(),
        credential: first.credential.clone(),
    }
}

async fn wait_for_socket_id(
    socket: &mut WebRtcSocket,
    loop_handle: &JoinHandle<()>,
) -> RelayResult<PeerId> {
    let deadline = Instant::now() + PEER_ID_TIMEOUT;

    loop {
        socket.update_peers();

        if let Some(id) = socket.id() {
            return Ok(id);
        }
        if loop_handle.is_finished() {
            return Err(RelayError::ConnectionFailed(
                "signalling server closed the connection".to_string(),
            ));
        }
        if Instant::now() > deadline {
            return Err(RelayError::ConnectionFailed(
                "timeout waiting for a socket id".to_string(),
            ));
        }

        tokio::time::sleep(POLL_STEP).await;
    }
}
