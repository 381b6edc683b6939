use crate::domain::{IceServer, MediaStream, TrackKind};
use crate::infrastructure::engine::{EngineEvent, EngineFactory, NegotiationEngine};
use crate::infrastructure::error::{EngineError, EngineResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Call recorded by a [`SimulatedEngine`]
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    AttachMedia(usize),
    CreateOffer,
    AcceptOffer(Value),
    CreateAnswer,
    AcceptAnswer(Value),
    AddCandidate(Value),
    Close,
}

pub type CallLog = Arc<Mutex<Vec<EngineCall>>>;

#[derive(Debug, Clone)]
pub struct SimulatedEngineOptions {
    /// Host candidates gathered after the first local description
    pub candidates: usize,
    /// Reject every remote candidate as malformed
    pub reject_candidates: bool,
    /// Report a connection failure once remote media would attach
    pub fail_connection: Option<String>,
    /// Time taken to produce each local description
    pub description_delay: Option<Duration>,
}

impl Default for SimulatedEngineOptions {
    fn default() -> Self {
        Self {
            candidates: 2,
            reject_candidates: false,
            fail_connection: None,
            description_delay: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SdpType {
    Offer,
    Answer,
}

impl SdpType {
    fn as_str(self) -> &'static str {
        match self {
            SdpType::Offer => "offer",
            SdpType::Answer => "answer",
        }
    }
}

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// In-process engine producing SDP-shaped payloads
///
/// Enforces the ordering rules of a real peer connection: an answer needs a
/// local offer, and candidates need a remote description.
pub struct SimulatedEngine {
    session: u64,
    options: SimulatedEngineOptions,
    local: Option<SdpType>,
    remote: Option<SdpType>,
    remote_has_media: bool,
    tracks: Vec<TrackKind>,
    gathered: bool,
    media_reported: bool,
    events: VecDeque<EngineEvent>,
    calls: CallLog,
    closed: bool,
}

impl SimulatedEngine {
    pub fn new(options: SimulatedEngineOptions) -> Self {
        Self {
            session: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            options,
            local: None,
            remote: None,
            remote_has_media: false,
            tracks: Vec::new(),
            gathered: false,
            media_reported: false,
            events: VecDeque::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            closed: false,
        }
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.closed {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    fn describe(&self, kind: SdpType) -> Value {
        let mut sdp = format!(
            "v=0\r\no=pairlink {} 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n",
            self.session
        );
        for (mid, track) in self.tracks.iter().enumerate() {
            let line = match track {
                TrackKind::Audio => "m=audio 9 UDP/TLS/RTP/SAVPF 111",
                TrackKind::Video => "m=video 9 UDP/TLS/RTP/SAVPF 96",
            };
            sdp.push_str(&format!("{}\r\na=mid:{}\r\na=sendrecv\r\n", line, mid));
        }
        json!({"type": kind.as_str(), "sdp": sdp})
    }

    fn parse_description(blob: &Value, expected: SdpType) -> EngineResult<bool> {
        let sdp = blob
            .get("sdp")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::Malformed("missing sdp".to_string()))?;
        if !sdp.starts_with("v=0") {
            return Err(EngineError::Malformed("sdp must start with v=0".to_string()));
        }
        if let Some(kind) = blob.get("type").and_then(Value::as_str) {
            if kind != expected.as_str() {
                return Err(EngineError::Malformed(format!(
                    "expected {} description, got {}",
                    expected.as_str(),
                    kind
                )));
            }
        }
        Ok(sdp.contains("\nm="))
    }

    fn set_local(&mut self, kind: SdpType) {
        self.local = Some(kind);
        if !self.gathered {
            self.gathered = true;
            for n in 0..self.options.candidates {
                self.events.push_back(EngineEvent::LocalCandidate(json!({
                    "candidate": format!(
                        "candidate:{} 1 udp 2130706431 127.0.0.1 {} typ host",
                        n + 1,
                        50000 + self.session * 10 + n as u64
                    ),
                    "sdpMid": "0",
                    "sdpMLineIndex": 0,
                })));
            }
        }
        self.check_connected();
    }

    fn check_connected(&mut self) {
        if self.media_reported || self.local.is_none() || self.remote.is_none() {
            return;
        }
        self.media_reported = true;
        if let Some(reason) = self.options.fail_connection.clone() {
            self.events.push_back(EngineEvent::ConnectionFailed(reason));
        } else if self.remote_has_media {
            self.events.push_back(EngineEvent::RemoteMediaAttached);
        }
    }
}

#[async_trait]
impl NegotiationEngine for SimulatedEngine {
    async fn attach_local_media(&mut self, stream: &MediaStream) -> EngineResult<()> {
        self.ensure_open()?;
        self.record(EngineCall::AttachMedia(stream.tracks().len()));
        let had_description = self.local.is_some();
        self.tracks
            .extend(stream.tracks().iter().map(|t| t.kind()));
        if had_description {
            self.events.push_back(EngineEvent::NegotiationNeeded);
        }
        Ok(())
    }

    async fn create_offer(&mut self) -> EngineResult<Value> {
        self.ensure_open()?;
        self.record(EngineCall::CreateOffer);
        pause(self.options.description_delay).await;
        let offer = self.describe(SdpType::Offer);
        self.set_local(SdpType::Offer);
        Ok(offer)
    }

    async fn accept_offer(&mut self, offer: Value) -> EngineResult<()> {
        self.ensure_open()?;
        self.record(EngineCall::AcceptOffer(offer.clone()));
        self.remote_has_media = Self::parse_description(&offer, SdpType::Offer)?;
        if self.local == Some(SdpType::Offer) {
            tracing::debug!("Rolling back local offer for incoming offer");
            self.local = None;
        }
        self.remote = Some(SdpType::Offer);
        Ok(())
    }

    async fn create_answer(&mut self) -> EngineResult<Value> {
        self.ensure_open()?;
        self.record(EngineCall::CreateAnswer);
        if self.remote != Some(SdpType::Offer) {
            return Err(EngineError::Failed(
                "cannot answer without a remote offer".to_string(),
            ));
        }
        pause(self.options.description_delay).await;
        let answer = self.describe(SdpType::Answer);
        self.set_local(SdpType::Answer);
        Ok(answer)
    }

    async fn accept_answer(&mut self, answer: Value) -> EngineResult<()> {
        self.ensure_open()?;
        self.record(EngineCall::AcceptAnswer(answer.clone()));
        if self.local != Some(SdpType::Offer) {
            return Err(EngineError::Failed(
                "answer received without a local offer".to_string(),
            ));
        }
        self.remote_has_media = Self::parse_description(&answer, SdpType::Answer)?;
        self.remote = Some(SdpType::Answer);
        self.check_connected();
        Ok(())
    }

    async fn add_remote_candidate(&mut self, candidate: Value) -> EngineResult<()> {
        self.ensure_open()?;
        self.record(EngineCall::AddCandidate(candidate.clone()));
        if self.options.reject_candidates {
            return Err(EngineError::Malformed("candidate rejected".to_string()));
        }
        if candidate.get("candidate").and_then(Value::as_str).is_none() {
            return Err(EngineError::Malformed("missing candidate line".to_string()));
        }
        if self.remote.is_none() {
            return Err(EngineError::Failed(
                "remote description not set".to_string(),
            ));
        }
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.record(EngineCall::Close);
        self.closed = true;
        self.events.clear();
    }
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

/// Factory handing out [`SimulatedEngine`]s and keeping their call logs
#[derive(Clone, Default)]
pub struct SimulatedEngineFactory {
    options: SimulatedEngineOptions,
    created: Arc<Mutex<Vec<CallLog>>>,
}

impl SimulatedEngineFactory {
    pub fn new(options: SimulatedEngineOptions) -> Self {
        Self {
            options,
            created: Arc::default(),
        }
    }

    /// Call logs of every engine created so far, oldest first
    pub fn call_logs(&self) -> Vec<Vec<EngineCall>> {
        self.created
            .lock()
            .iter()
            .map(|log| log.lock().clone())
            .collect()
    }

    pub fn engines_created(&self) -> usize {
        self.created.lock().len()
    }
}

#[async_trait]
impl EngineFactory for SimulatedEngineFactory {
    type Engine = SimulatedEngine;

    async fn create(&self, ice_servers: &[IceServer]) -> EngineResult<SimulatedEngine> {
        tracing::debug!(
            "Creating simulated engine with {} ICE server(s)",
            ice_servers.len()
        );
        let engine = SimulatedEngine::new(self.options.clone());
        self.created.lock().push(engine.calls());
        Ok(engine)
    }
}
