use crate::domain::{IceServer, MediaStream, TrackKind};
use crate::infrastructure::engine::{EngineEvent, EngineFactory, NegotiationEngine};
use crate::infrastructure::error::{EngineError, EngineResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

type EventQueue = Arc<Mutex<VecDeque<EngineEvent>>>;

fn failed(e: webrtc::Error) -> EngineError {
    EngineError::Failed(e.to_string())
}

fn description_json(desc: &RTCSessionDescription) -> Value {
    json!({
        "type": desc.sdp_type.to_string().to_lowercase(),
        "sdp": desc.sdp,
    })
}

fn sdp_of(blob: &Value) -> EngineResult<String> {
    blob.get("sdp")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| EngineError::Malformed("missing sdp".to_string()))
}

/// Negotiation engine backed by a `webrtc` peer connection
pub struct WebRtcEngine {
    pc: Arc<RTCPeerConnection>,
    events: EventQueue,
    negotiated: Arc<AtomicBool>,
    closed: bool,
}

impl WebRtcEngine {
    async fn new(ice_servers: &[IceServer]) -> EngineResult<Self> {
        let mut media = MediaEngine::default();
        media.register_default_codecs().map_err(failed)?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media).map_err(failed)?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(config).await.map_err(failed)?);
        let engine = Self {
            pc,
            events: Arc::new(Mutex::new(VecDeque::new())),
            negotiated: Arc::new(AtomicBool::new(false)),
            closed: false,
        };
        engine.install_handlers();
        Ok(engine)
    }

    fn install_handlers(&self) {
        let events = self.events.clone();
        self.pc
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                let events = events.clone();
                Box::pin(async move {
                    let Some(candidate) = candidate else {
                        return;
                    };
                    match candidate.to_json() {
                        Ok(init) => match serde_json::to_value(&init) {
                            Ok(value) => events.lock().push_back(EngineEvent::LocalCandidate(value)),
                            Err(e) => tracing::warn!("Could not encode candidate: {}", e),
                        },
                        Err(e) => tracing::warn!("Could not serialize candidate: {}", e),
                    }
                })
            }));

        // The first offer/answer round covers the tracks attached before it
        let events = self.events.clone();
        let negotiated = self.negotiated.clone();
        self.pc.on_negotiation_needed(Box::new(move || {
            let events = events.clone();
            let negotiated = negotiated.clone();
            Box::pin(async move {
                if negotiated.load(Ordering::SeqCst) {
                    events.lock().push_back(EngineEvent::NegotiationNeeded);
                }
            })
        }));

        let events = self.events.clone();
        let reported = Arc::new(AtomicBool::new(false));
        self.pc
            .on_track(Box::new(move |track, _receiver, _transceiver| {
                let events = events.clone();
                let reported = reported.clone();
                Box::pin(async move {
                    tracing::info!("📺 Remote {} track attached", track.kind());
                    if !reported.swap(true, Ordering::SeqCst) {
                        events.lock().push_back(EngineEvent::RemoteMediaAttached);
                    }
                })
            }));

        let events = self.events.clone();
        self.pc
            .on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
                let events = events.clone();
                Box::pin(async move {
                    tracing::info!("Peer connection state: {:?}", state);
                    if state == RTCPeerConnectionState::Failed {
                        events.lock().push_back(EngineEvent::ConnectionFailed(
                            "peer connection failed".to_string(),
                        ));
                    }
                })
            }));
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.closed {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NegotiationEngine for WebRtcEngine {
    async fn attach_local_media(&mut self, stream: &MediaStream) -> EngineResult<()> {
        self.ensure_open()?;
        for track in stream.tracks() {
            let capability = match track.kind() {
                TrackKind::Audio => RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 2,
                    ..Default::default()
                },
                TrackKind::Video => RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    clock_rate: 90000,
                    ..Default::default()
                },
            };
            let local = Arc::new(TrackLocalStaticSample::new(
                capability,
                track.id().to_string(),
                stream.id().to_string(),
            ));
            self.pc
                .add_track(local as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .map_err(failed)?;
        }
        tracing::debug!("Attached {} local track(s)", stream.tracks().len());
        Ok(())
    }

    async fn create_offer(&mut self) -> EngineResult<Value> {
        self.ensure_open()?;
        let offer = self.pc.create_offer(None).await.map_err(failed)?;
        self.pc
            .set_local_description(offer.clone())
            .await
            .map_err(failed)?;
        Ok(description_json(&offer))
    }

    async fn accept_offer(&mut self, offer: Value) -> EngineResult<()> {
        self.ensure_open()?;
        let sdp = sdp_of(&offer)?;
        let desc = RTCSessionDescription::offer(sdp)
            .map_err(|e| EngineError::Malformed(e.to_string()))?;

        if self.pc.signaling_state() == RTCSignalingState::HaveLocalOffer {
            let mut rollback = RTCSessionDescription::default();
            rollback.sdp_type = RTCSdpType::Rollback;
            self.pc
                .set_local_description(rollback)
                .await
                .map_err(failed)?;
        }

        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| EngineError::Malformed(e.to_string()))
    }

    async fn create_answer(&mut self) -> EngineResult<Value> {
        self.ensure_open()?;
        let answer = self.pc.create_answer(None).await.map_err(failed)?;
        self.pc
            .set_local_description(answer.clone())
            .await
            .map_err(failed)?;
        self.negotiated.store(true, Ordering::SeqCst);
        Ok(description_json(&answer))
    }

    async fn accept_answer(&mut self, answer: Value) -> EngineResult<()> {
        self.ensure_open()?;
        let sdp = sdp_of(&answer)?;
        let desc = RTCSessionDescription::answer(sdp)
            .map_err(|e| EngineError::Malformed(e.to_string()))?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| EngineError::Malformed(e.to_string()))?;
        self.negotiated.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn add_remote_candidate(&mut self, candidate: Value) -> EngineResult<()> {
        self.ensure_open()?;
        let init: RTCIceCandidateInit = serde_json::from_value(candidate)
            .map_err(|e| EngineError::Malformed(e.to_string()))?;
        if init.candidate.is_empty() {
            // End-of-candidates marker
            return Ok(());
        }
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| EngineError::Malformed(e.to_string()))
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        self.events.lock().drain(..).collect()
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.pc.close().await {
            tracing::warn!("Error closing peer connection: {}", e);
        }
    }
}

/// Builds a fresh [`WebRtcEngine`] per pairing
#[derive(Debug, Clone, Copy, Default)]
pub struct WebRtcEngineFactory;

#[async_trait]
impl EngineFactory for WebRtcEngineFactory {
    type Engine = WebRtcEngine;

    async fn create(&self, ice_servers: &[IceServer]) -> EngineResult<WebRtcEngine> {
        WebRtcEngine::new(ice_servers).await
    }
}
