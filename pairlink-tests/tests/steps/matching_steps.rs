use cucumber::{given, then, when};
use pairlink_core::{Matcher, PairId, ParticipantId, Role};
use pairlink_p2p::SessionEvent;
use pairlink_tests::{PairingWorld, LOBBY};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

fn role(name: &str) -> Role {
    match name {
        "Offerer" => Role::Offerer,
        "Answerer" => Role::Answerer,
        other => panic!("unknown role '{}'", other),
    }
}

// ===== Given Steps =====

#[given(expr = "a scripted peer {string} in the lobby")]
async fn scripted_peer_in_lobby(world: &mut PairingWorld, name: String) {
    world.add_scripted_peer(&name).await;
    world.scripted_subscribe(&name, LOBBY).await;
}

#[given(expr = "a matcher for {string} alone in the lobby")]
async fn matcher_alone(world: &mut PairingWorld, name: String) {
    let local = ParticipantId::new(name);
    let mut matcher = Matcher::new(local.clone());
    let outcome = matcher.on_members(vec![local], &mut StdRng::seed_from_u64(1));
    assert!(outcome.is_none(), "a lone matcher must not propose");
    world.matcher = Some(matcher);
}

// ===== When Steps =====

#[when(expr = "{string} starts a session")]
async fn starts_session(world: &mut PairingWorld, name: String) {
    world.start(&name).await;
}

#[when("the sessions run for a while")]
async fn sessions_run(world: &mut PairingWorld) {
    world.run_rounds(8).await;
}

#[when(expr = "{string} runs once")]
async fn runs_once(world: &mut PairingWorld, name: String) {
    world.participant(&name).poll().await;
}

#[when(expr = "the scripted peer {string} proposes pair {string} to {string}")]
async fn scripted_proposes(world: &mut PairingWorld, name: String, pair: String, target: String) {
    world.scripted_peer(&name).publish(
        LOBBY,
        json!({"type": "match", "pairId": pair, "target": target}),
    );
}

#[when(expr = "the matcher receives a proposal for pair {string} to {string} from {string}")]
async fn matcher_receives(world: &mut PairingWorld, pair: String, target: String, from: String) {
    let matcher = world.matcher.as_mut().expect("no matcher");
    let outcome = matcher.on_message(
        &ParticipantId::new(from),
        &json!({"type": "match", "pairId": pair, "target": target}),
    );
    assert!(outcome.is_none());
}

// ===== Then Steps =====

#[then(expr = "{string} should be {string}")]
async fn should_have_status(world: &mut PairingWorld, name: String, status: String) {
    let actual = world.participant(&name).status().to_string();
    assert_eq!(actual, status, "status of '{}'", name);
}

#[then("no proposal should have been published in the lobby")]
async fn no_proposal(world: &mut PairingWorld) {
    assert!(world.hub.history(LOBBY).is_empty());
}

#[then(expr = "{string} should be paired with {string} as {string}")]
async fn paired_as(world: &mut PairingWorld, name: String, peer: String, expected: String) {
    let pairing = world
        .participant(&name)
        .session
        .pairing()
        .unwrap_or_else(|| panic!("'{}' is not paired", name));
    assert_eq!(pairing.peer, ParticipantId::new(peer));
    assert_eq!(pairing.role, role(&expected));
}

#[then(expr = "{string} and {string} should share pair id {string}")]
async fn share_pair_id(world: &mut PairingWorld, first: String, second: String, expected: String) {
    for name in [first, second] {
        let pairing = world
            .participant(&name)
            .session
            .pairing()
            .unwrap_or_else(|| panic!("'{}' is not paired", name));
        assert_eq!(pairing.pair_id.as_str(), expected);
    }
}

#[then(expr = "{string} should have remote media")]
async fn has_remote_media(world: &mut PairingWorld, name: String) {
    assert!(world
        .participant(&name)
        .saw(&SessionEvent::RemoteMediaAttached));
}

#[then(expr = "{string} should not have remote media")]
async fn has_no_remote_media(world: &mut PairingWorld, name: String) {
    assert!(!world
        .participant(&name)
        .saw(&SessionEvent::RemoteMediaAttached));
}

#[then(expr = "the pair id of {string} and {string} should be {string}")]
async fn pair_id_of(_world: &mut PairingWorld, a: String, b: String, expected: String) {
    let pair_id = PairId::derive(&ParticipantId::new(a), &ParticipantId::new(b));
    assert_eq!(pair_id.as_str(), expected);
}

#[then("the matcher should still be undecided")]
async fn matcher_undecided(world: &mut PairingWorld) {
    let matcher = world.matcher.as_ref().expect("no matcher");
    assert!(!matcher.is_decided());
}

#[then(expr = "{string} should have yielded the Offerer role")]
async fn yielded_offerer(world: &mut PairingWorld, name: String) {
    assert!(world
        .participant(&name)
        .saw(&SessionEvent::RoleChanged(Role::Answerer)));
}
