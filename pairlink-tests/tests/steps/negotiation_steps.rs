use cucumber::{given, then, when};
use pairlink_core::{ParticipantId, SessionError};
use pairlink_p2p::infrastructure::EngineCall;
use pairlink_p2p::{SessionEvent, SimulatedEngineFactory, SimulatedEngineOptions, SyntheticMediaSource};
use pairlink_tests::{error_kind, scenario_config, PairingWorld, LOBBY};
use serde_json::json;

// ===== Given Steps =====

#[given(expr = "{string} rejects remote candidates")]
async fn rejects_candidates(world: &mut PairingWorld, name: String) {
    world.add_participant(
        &name,
        scenario_config(),
        SyntheticMediaSource::new(),
        SimulatedEngineFactory::new(SimulatedEngineOptions {
            reject_candidates: true,
            ..Default::default()
        }),
    );
}

// ===== When Steps =====

#[when(expr = "a scripted peer {string} enters the lobby")]
async fn scripted_enters_lobby(world: &mut PairingWorld, name: String) {
    world.add_scripted_peer(&name).await;
    world.scripted_subscribe(&name, LOBBY).await;
}

#[when(expr = "the scripted peer {string} joins {string}")]
async fn scripted_joins(world: &mut PairingWorld, name: String, topic: String) {
    world.scripted_subscribe(&name, &topic).await;
}

#[when(expr = "the scripted peer {string} sends an offer on {string}")]
async fn scripted_sends_offer(world: &mut PairingWorld, name: String, topic: String) {
    world.scripted_peer(&name).publish(
        &topic,
        json!({
            "type": "offer",
            "offer": {
                "type": "offer",
                "sdp": "v=0\r\no=scripted 1 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=mid:0\r\n",
            },
        }),
    );
}

#[when(expr = "the scripted peer {string} sends an empty offer on {string}")]
async fn scripted_sends_empty_offer(world: &mut PairingWorld, name: String, topic: String) {
    world
        .scripted_peer(&name)
        .publish(&topic, json!({"type": "offer"}));
}

#[when(expr = "the scripted peer {string} sends a candidate on {string}")]
async fn scripted_sends_candidate(world: &mut PairingWorld, name: String, topic: String) {
    world.scripted_peer(&name).publish(
        &topic,
        json!({
            "type": "candidate",
            "candidate": {
                "candidate": "candidate:1 1 udp 2130706431 10.0.0.2 60001 typ host",
                "sdpMid": "0",
                "sdpMLineIndex": 0,
            },
        }),
    );
}

// ===== Then Steps =====

#[then(expr = "only {string} should have sent an {string} on {string}")]
async fn only_sender_of(world: &mut PairingWorld, sender: String, kind: String, topic: String) {
    let senders: Vec<ParticipantId> = world
        .hub
        .history(&topic)
        .into_iter()
        .filter(|(_, payload)| payload["type"] == kind.as_str())
        .map(|(from, _)| from)
        .collect();
    assert_eq!(senders, vec![ParticipantId::new(sender)]);
}

#[then("nobody should be left in the lobby")]
async fn lobby_empty(world: &mut PairingWorld) {
    assert!(world.hub.members(LOBBY).is_empty());
}

#[then(expr = "{string} should have failed with {string}")]
async fn failed_with(world: &mut PairingWorld, name: String, kind: String) {
    let status = world.participant(&name).status().clone();
    let err = status
        .failure()
        .unwrap_or_else(|| panic!("'{}' has not failed: {}", name, status));
    assert_eq!(error_kind(err), kind);
}

#[then(expr = "{string} should never have applied an offer")]
async fn never_applied_offer(world: &mut PairingWorld, name: String) {
    let calls = world.participant(&name).engine_calls();
    assert!(!calls
        .iter()
        .any(|call| matches!(call, EngineCall::AcceptOffer(_))));
}

#[then(expr = "{string} should hold no live media")]
async fn no_live_media(world: &mut PairingWorld, name: String) {
    assert_eq!(world.participant(&name).media.live_tracks(), 0);
}

#[then(expr = "{string} should have applied the offer before any candidate")]
async fn offer_before_candidates(world: &mut PairingWorld, name: String) {
    let calls = world.participant(&name).engine_calls();
    let offer_at = calls
        .iter()
        .position(|call| matches!(call, EngineCall::AcceptOffer(_)))
        .expect("offer was never applied");
    let first_candidate = calls
        .iter()
        .position(|call| matches!(call, EngineCall::AddCandidate(_)))
        .expect("candidate was never applied");
    assert!(offer_at < first_candidate);
}

#[then(expr = "{string} should have reported {int} malformed candidates")]
async fn reported_malformed(world: &mut PairingWorld, name: String, count: usize) {
    let reported = world
        .participant(&name)
        .events
        .iter()
        .filter(|e| {
            matches!(
                e,
                SessionEvent::Diagnostic(SessionError::MalformedCandidate(_))
            )
        })
        .count();
    assert_eq!(reported, count);
}
