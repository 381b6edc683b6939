pub mod handshake;
pub mod matcher;

pub use handshake::{Handshake, HandshakeOutput, HandshakePhase, HandshakeStep};
pub use matcher::{Matcher, MatcherOutcome};
