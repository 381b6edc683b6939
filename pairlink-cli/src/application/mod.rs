pub mod demo;

pub use demo::{run_demo, DemoOptions, DemoReport, ParticipantReport};
