pub mod application;
pub mod infrastructure;

pub use application::{run_demo, DemoOptions, DemoReport, ParticipantReport};
pub use infrastructure::{CliError, LogConfig, LogGuard, Result, SessionRuntime};
