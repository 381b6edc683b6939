use cucumber::{given, then, when};
use pairlink_p2p::{SessionMode, SimulatedEngineFactory, SyntheticMediaSource};
use pairlink_tests::{error_kind, scenario_config, PairingWorld, LOBBY};

// ===== Given Steps =====

#[given(expr = "media access is denied for {string}")]
async fn media_denied(world: &mut PairingWorld, name: String) {
    world.add_participant(
        &name,
        scenario_config(),
        SyntheticMediaSource::denied("permission dismissed"),
        SimulatedEngineFactory::default(),
    );
}

#[given("the relay refuses connections")]
async fn relay_refuses(world: &mut PairingWorld) {
    world.hub.refuse_connections("relay offline");
}

#[given("the relay refuses the lobby")]
async fn lobby_refused(world: &mut PairingWorld) {
    world.hub.refuse_topic(LOBBY, "topic forbidden");
}

#[given(expr = "{string} only previews media")]
async fn preview_only(world: &mut PairingWorld, name: String) {
    world.add_participant(
        &name,
        scenario_config().with_mode(SessionMode::Preview),
        SyntheticMediaSource::new(),
        SimulatedEngineFactory::default(),
    );
}

// ===== When Steps =====

#[when(expr = "{string} stops the session")]
async fn stops_session(world: &mut PairingWorld, name: String) {
    let participant = world.participant(&name);
    participant.session.stop().await;
    participant
        .events
        .extend(participant.session.drain_events());
}

#[when(expr = "media access is granted for {string}")]
async fn media_granted(world: &mut PairingWorld, name: String) {
    world.participant(&name).media.allow();
}

// ===== Then Steps =====

#[then(expr = "the start should have failed with {string}")]
async fn start_failed_with(world: &mut PairingWorld, kind: String) {
    let err = world
        .last_error
        .as_ref()
        .expect("the last start succeeded");
    assert_eq!(error_kind(err), kind);
}

#[then("the relay should have no connections")]
async fn no_connections(world: &mut PairingWorld) {
    assert_eq!(world.hub.connection_count(), 0);
}
