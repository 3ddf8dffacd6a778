mod chat;
mod peer;
mod room;
mod signaling;
mod status;

pub use chat::ChatMessage;
pub use peer::{PeerIdentity, Role};
pub use room::RoomId;
pub use signaling::{
    IceCandidate, IceServerConfig, SdpKind, SessionDescription, Signal, SignalEnvelope, SignalKind,
};
pub use status::ConnectionStatus;
