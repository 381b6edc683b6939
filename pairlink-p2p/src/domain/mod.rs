mod ice_server;
mod media;

pub use ice_server::IceServer;
pub use media::{MediaConstraints, MediaStream, MediaTrack, TrackKind};
