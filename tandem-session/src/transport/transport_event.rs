use crate::transport::connection_engine::{
    EngineConnectionState, EngineGeneration, IceConnectionState, RemoteTrack, SignalingState,
};
use tandem_core::IceCandidate;

/// Events an engine reports to the session loop.
///
/// Each event carries the generation of the engine that produced it.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A local candidate was gathered and must be sent to the peer.
    CandidateGenerated(EngineGeneration, IceCandidate),

    ConnectionStateChanged(EngineGeneration, EngineConnectionState),

    IceConnectionStateChanged(EngineGeneration, IceConnectionState),

    SignalingStateChanged(EngineGeneration, SignalingState),

    /// The peer started sending a media track.
    TrackReceived(EngineGeneration, RemoteTrack),

    /// A data channel (ours or the peer's) is open; carries its label.
    DataChannelOpened(EngineGeneration, String),
}

impl EngineEvent {
    pub fn generation(&self) -> EngineGeneration {
        match self {
            EngineEvent::CandidateGenerated(g, _)
            | EngineEvent::ConnectionStateChanged(g, _)
            | EngineEvent::IceConnectionStateChanged(g, _)
            | EngineEvent::SignalingStateChanged(g, _)
            | EngineEvent::TrackReceived(g, _)
            | EngineEvent::DataChannelOpened(g, _) => *g,
        }
    }
}
