use crate::application::config::{SessionConfig, SessionMode};
use crate::application::events::SessionEvent;
use crate::application::liveness::{RunToken, SessionHandle};
use crate::application::negotiator::{Negotiator, NegotiatorEvent};
use crate::domain::MediaStream;
use crate::infrastructure::engine::{EngineFactory, NegotiationEngine};
use crate::infrastructure::media_source::MediaSource;
use crate::infrastructure::relay::{Relay, RelayConnection, Topic, TopicEvent};
use pairlink_core::{
    Matcher, MatcherOutcome, Pairing, ParticipantId, SessionError, SessionStatus,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

/// Everything one session run holds; dropped as a unit on teardown
struct ActiveSession<C: RelayConnection, E: NegotiationEngine> {
    media: MediaStream,
    connection: Option<C>,
    lobby: Option<C::Topic>,
    matcher: Option<Matcher>,
    negotiator: Option<Negotiator<C::Topic, E>>,
}

impl<C: RelayConnection, E: NegotiationEngine> ActiveSession<C, E> {
    fn new(media: MediaStream) -> Self {
        Self {
            media,
            connection: None,
            lobby: None,
            matcher: None,
            negotiator: None,
        }
    }
}

/// Session lifecycle: media, relay, lobby matching, pair negotiation
///
/// Single logical task: `start` and `poll` are driven by the owner (or by
/// [`run`](Self::run)), while a [`SessionHandle`] can request a stop from
/// elsewhere.
pub struct SessionController<R: Relay, M: MediaSource, F: EngineFactory> {
    config: SessionConfig,
    relay: R,
    media_source: M,
    engines: F,
    status: SessionStatus,
    status_tx: watch::Sender<SessionStatus>,
    events: Vec<SessionEvent>,
    event_sink: Option<mpsc::UnboundedSender<SessionEvent>>,
    handle: SessionHandle,
    run: RunToken,
    rng: StdRng,
    active: Option<ActiveSession<R::Connection, F::Engine>>,
}

impl<R, M, F> SessionController<R, M, F>
where
    R: Relay,
    M: MediaSource,
    F: EngineFactory,
{
    pub fn new(config: SessionConfig, relay: R, media_source: M, engines: F) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (status_tx, _) = watch::channel(SessionStatus::Idle);
        let handle = SessionHandle::new();

        Self {
            config,
            relay,
            media_source,
            engines,
            status: SessionStatus::Idle,
            status_tx,
            events: Vec::new(),
            event_sink: None,
            run: handle.token(),
            handle,
            rng,
            active: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Send events to `sink` as they happen instead of buffering them
    ///
    /// Events buffered so far are sent first; `drain_events` stays empty
    /// from here on.
    pub fn forward_events(&mut self, sink: mpsc::UnboundedSender<SessionEvent>) {
        for event in self.events.drain(..) {
            let _ = sink.send(event);
        }
        self.event_sink = Some(sink);
    }

    pub fn local_id(&self) -> Option<&ParticipantId> {
        self.active
            .as_ref()
            .and_then(|a| a.connection.as_ref())
            .map(|c| c.local_id())
    }

    /// Current pairing, with the reconciled role once negotiation started
    pub fn pairing(&self) -> Option<Pairing> {
        let active = self.active.as_ref()?;
        if let Some(negotiator) = &active.negotiator {
            return Some(Pairing::new(
                negotiator.pair_id().clone(),
                negotiator.role(),
                negotiator.peer().clone(),
            ));
        }
        active.matcher.as_ref()?.decision().cloned()
    }

    /// Acquire media, connect, and join the lobby
    ///
    /// Calling this on a live session does nothing. A stop requested while
    /// this is suspended wins: late results are released and the session
    /// ends.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.status.is_live() {
            tracing::warn!("⚠️ Session already running ({}), ignoring start", self.status);
            return Ok(());
        }

        self.run = self.handle.token();
        self.set_status(SessionStatus::RequestingMedia);

        let acquired = self.media_source.acquire(self.config.media).await;
        if self.is_stale() {
            if let Ok(stream) = &acquired {
                stream.stop_all();
                tracing::info!("Discarding media acquired after stop");
            }
            self.abandon().await;
            return Ok(());
        }
        let media = match acquired {
            Ok(media) => media,
            Err(e) => {
                return Err(self
                    .fail(SessionError::MediaAccessDenied(e.to_string()))
                    .await)
            }
        };
        self.active = Some(ActiveSession::new(media));

        if self.config.mode == SessionMode::Preview {
            self.set_status(SessionStatus::Previewing);
            return Ok(());
        }

        self.set_status(SessionStatus::ConnectingSignaling);
        let connected = self.relay.connect().await;
        if self.is_stale() {
            if let Ok(mut connection) = connected {
                connection.close();
            }
            self.abandon().await;
            return Ok(());
        }
        let mut connection = match connected {
            Ok(connection) => connection,
            Err(e) => {
                return Err(self
                    .fail(SessionError::SignalingConnectError(e.to_string()))
                    .await)
            }
        };
        tracing::info!("✅ Connected to relay as {}", connection.local_id());

        let lobby_topic = self.config.lobby_topic.clone();
        let subscribed = connection.subscribe(&lobby_topic).await;
        if self.is_stale() {
            if let Ok(mut lobby) = subscribed {
                lobby.unsubscribe();
            }
            connection.close();
            self.abandon().await;
            return Ok(());
        }
        let lobby = match subscribed {
            Ok(lobby) => lobby,
            Err(e) => {
                connection.close();
                return Err(self
                    .fail(SessionError::TopicOpenError {
                        topic: lobby_topic,
                        reason: e.to_string(),
                    })
                    .await);
            }
        };

        let matcher = Matcher::new(connection.local_id().clone());
        if let Some(active) = self.active.as_mut() {
            active.connection = Some(connection);
            active.lobby = Some(lobby);
            active.matcher = Some(matcher);
        }
        tracing::info!("🚪 Joined lobby '{}'", lobby_topic);
        self.set_status(SessionStatus::WaitingForPeer);
        Ok(())
    }

    /// One dispatch pass: lobby events to the matcher, then the negotiator
    ///
    /// Returns the number of events handled.
    pub async fn poll(&mut self) -> usize {
        if self.status.is_live() && self.is_stale() {
            tracing::info!("🛑 Stop requested, tearing down");
            self.stop().await;
            return 0;
        }

        let mut processed = 0;

        let lobby_events = self
            .active
            .as_mut()
            .and_then(|a| a.lobby.as_mut())
            .map(|lobby| lobby.poll_events())
            .unwrap_or_default();
        for event in lobby_events {
            processed += 1;
            self.on_lobby_event(event).await;
            if !self.status.is_live() {
                return processed;
            }
        }

        let negotiator_events = match self.active.as_mut().and_then(|a| a.negotiator.as_mut()) {
            Some(negotiator) => negotiator.poll().await,
            None => Vec::new(),
        };
        for event in negotiator_events {
            processed += 1;
            self.on_negotiator_event(event).await;
            if !self.status.is_live() {
                break;
            }
        }

        // A stop that landed while the negotiator awaited the engine
        if self.status.is_live() && self.is_stale() {
            self.stop().await;
        }

        processed
    }

    /// Poll every `poll_interval_ms` until stopped or terminal
    pub async fn run(&mut self) {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let handle = self.handle.clone();

        while self.status.is_live() {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll().await;
                }
                _ = handle.stopped() => {
                    if self.is_stale() {
                        self.stop().await;
                    }
                }
            }
        }

        tracing::info!("🏁 Session loop finished: {}", self.status);
    }

    /// Release everything and end the session; safe from any status
    pub async fn stop(&mut self) {
        self.teardown().await;
        self.set_status(SessionStatus::Ended);
    }

    async fn on_lobby_event(&mut self, event: TopicEvent) {
        if let TopicEvent::Closed(reason) = &event {
            let negotiating = self
                .active
                .as_ref()
                .is_some_and(|a| a.negotiator.is_some());
            if negotiating {
                tracing::debug!("Lobby closed after pairing: {}", reason);
                if let Some(active) = self.active.as_mut() {
                    active.lobby = None;
                }
            } else {
                self.fail(SessionError::NegotiationTransportFailure(format!(
                    "lobby closed: {}",
                    reason
                )))
                .await;
            }
            return;
        }

        let Some(matcher) = self.active.as_mut().and_then(|a| a.matcher.as_mut()) else {
            return;
        };
        let outcome = match event {
            TopicEvent::Members(snapshot) => matcher.on_members(snapshot, &mut self.rng),
            TopicEvent::MemberJoined(id) => {
                matcher.on_member_joined(id);
                None
            }
            TopicEvent::MemberLeft(id) => {
                matcher.on_member_left(&id);
                None
            }
            TopicEvent::Data { from, payload } => matcher.on_message(&from, &payload),
            TopicEvent::Closed(_) => None,
        };

        match outcome {
            Some(MatcherOutcome::Proposed { proposal, pairing }) => {
                let published = match self.active.as_mut().and_then(|a| a.lobby.as_mut()) {
                    Some(lobby) => proposal
                        .to_value()
                        .map_err(|e| e.to_string())
                        .and_then(|value| lobby.publish(value).map_err(|e| e.to_string())),
                    None => Err("lobby not subscribed".to_string()),
                };
                if let Err(reason) = published {
                    self.fail(SessionError::NegotiationTransportFailure(format!(
                        "could not publish proposal: {}",
                        reason
                    )))
                    .await;
                    return;
                }
                self.begin_negotiation(pairing).await;
            }
            Some(MatcherOutcome::Accepted(pairing)) => self.begin_negotiation(pairing).await,
            Some(MatcherOutcome::Crossed { pairing, yielded }) => {
                if let Some(negotiator) = self.active.as_mut().and_then(|a| a.negotiator.as_mut())
                {
                    negotiator.resolve_crossed(yielded);
                }
                if yielded {
                    self.emit(SessionEvent::RoleChanged(pairing.role));
                }
            }
            None => {}
        }
    }

    async fn begin_negotiation(&mut self, pairing: Pairing) {
        self.emit(SessionEvent::Paired {
            pair_id: pairing.pair_id.clone(),
            role: pairing.role,
            peer: pairing.peer.clone(),
        });
        self.set_status(SessionStatus::Matched);

        let created = self.engines.create(&self.config.ice_servers).await;
        if self.is_stale() {
            if let Ok(mut engine) = created {
                engine.close().await;
            }
            self.stop().await;
            return;
        }
        let mut engine = match created {
            Ok(engine) => engine,
            Err(e) => {
                self.fail(SessionError::NegotiationTransportFailure(e.to_string()))
                    .await;
                return;
            }
        };

        let topic_name = pairing.pair_id.topic_name(&self.config.pair_topic_prefix);
        let Some(connection) = self.active.as_mut().and_then(|a| a.connection.as_mut()) else {
            engine.close().await;
            return;
        };
        let local_id = connection.local_id().clone();
        let subscribed = connection.subscribe(&topic_name).await;

        if self.is_stale() {
            if let Ok(mut topic) = subscribed {
                topic.unsubscribe();
            }
            engine.close().await;
            self.stop().await;
            return;
        }
        let topic = match subscribed {
            Ok(topic) => topic,
            Err(e) => {
                engine.close().await;
                self.fail(SessionError::TopicOpenError {
                    topic: topic_name,
                    reason: e.to_string(),
                })
                .await;
                return;
            }
        };

        let run = self.run.clone();
        if let Some(active) = self.active.as_mut() {
            let media = active.media.clone();
            active.negotiator = Some(Negotiator::new(local_id, pairing, topic, engine, media, run));
        }
    }

    async fn on_negotiator_event(&mut self, event: NegotiatorEvent) {
        match event {
            NegotiatorEvent::Activated => {
                if !self.config.leave_lobby_on_match {
                    return;
                }
                if let Some(mut lobby) = self.active.as_mut().and_then(|a| a.lobby.take()) {
                    lobby.unsubscribe();
                    tracing::info!("🚪 Left lobby '{}'", lobby.name());
                }
            }
            NegotiatorEvent::RemoteMediaAttached => {
                self.emit(SessionEvent::RemoteMediaAttached);
            }
            NegotiatorEvent::Diagnostic(err) => {
                self.emit(SessionEvent::Diagnostic(err));
            }
            NegotiatorEvent::Terminated(None) => {}
            NegotiatorEvent::Terminated(Some(err)) => {
                self.fail(err).await;
            }
        }
    }

    fn is_stale(&self) -> bool {
        self.run.is_stale()
    }

    /// Release everything, then report the failure
    async fn fail(&mut self, err: SessionError) -> SessionError {
        tracing::error!("❌ Session failed: {}", err);
        self.teardown().await;
        self.set_status(SessionStatus::Failed(err.clone()));
        err
    }

    async fn abandon(&mut self) {
        self.teardown().await;
        self.set_status(SessionStatus::Ended);
    }

    /// Negotiator, lobby, media, connection; in that order
    async fn teardown(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        if let Some(mut negotiator) = active.negotiator.take() {
            negotiator.close().await;
        }
        if let Some(mut lobby) = active.lobby.take() {
            lobby.unsubscribe();
        }
        let stopped = active.media.stop_all();
        if let Some(mut connection) = active.connection.take() {
            connection.close();
        }

        tracing::info!("🧹 Released session resources ({} track(s) stopped)", stopped);
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.status == status {
            return;
        }
        tracing::info!("📊 Status: {} → {}", self.status, status);
        self.status = status.clone();
        self.status_tx.send_replace(status.clone());
        self.emit(SessionEvent::StatusChanged(status));
    }

    fn emit(&mut self, event: SessionEvent) {
        match &self.event_sink {
            Some(sink) => {
                if sink.send(event).is_err() {
                    tracing::debug!("Event receiver dropped");
                }
            }
            None => self.events.push(event),
        }
    }
}
