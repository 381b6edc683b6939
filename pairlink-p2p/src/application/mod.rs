mod config;
mod controller;
mod events;
mod liveness;
mod negotiator;

pub use config::{SessionConfig, SessionMode};
pub use controller::SessionController;
pub use events::SessionEvent;
pub use liveness::{RunToken, SessionHandle};
pub use negotiator::{Negotiator, NegotiatorEvent};
