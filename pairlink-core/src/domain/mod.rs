pub mod error;
pub mod message;
pub mod pair;
pub mod participant;
pub mod status;

pub use error::SessionError;
pub use message::{
    LobbyMessage, MatchProposal, SignalingDecodeError, SignalingKind, SignalingMessage,
};
pub use pair::{PairId, Pairing, Role};
pub use participant::{Membership, ParticipantId};
pub use status::SessionStatus;
