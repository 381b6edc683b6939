mod steps;

use cucumber::World;
use pairlink_tests::PairingWorld;
use std::path::PathBuf;

fn features() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/features")
}

#[cfg(feature = "output-junit")]
async fn run() {
    let report = std::fs::File::create("junit-report.xml").expect("create junit-report.xml");
    PairingWorld::cucumber()
        .with_writer(cucumber::writer::JUnit::new(report, 0))
        .run(features())
        .await;
}

#[cfg(all(feature = "output-json", not(feature = "output-junit")))]
async fn run() {
    let report = std::fs::File::create("cucumber-report.json").expect("create cucumber-report.json");
    PairingWorld::cucumber()
        .with_writer(cucumber::writer::Json::new(report))
        .run(features())
        .await;
}

// Every scenario owns its relay hub, so they can run side by side
#[cfg(not(any(feature = "output-json", feature = "output-junit")))]
async fn run() {
    PairingWorld::cucumber().run_and_exit(features()).await;
}

#[tokio::main]
async fn main() {
    run().await;
}
