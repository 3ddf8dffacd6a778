use crate::transport::transport_event::EngineEvent;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tandem_core::{IceCandidate, SessionDescription};
use tokio::sync::mpsc;
use webrtc::track::track_local::TrackLocal;

/// Sequence number of an engine instance within one session.
///
/// Every rebuild gets the next generation. Events tagged with an older
/// generation belong to a closed engine and are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EngineGeneration(pub u64);

impl EngineGeneration {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for EngineGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Offer/answer phase of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalingState {
    #[default]
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

/// Aggregate transport state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineConnectionState {
    #[default]
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IceConnectionState {
    #[default]
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Unknown,
}

/// Metadata of a track the remote peer sends us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: MediaKind,
}

/// Public control surface of a peer connection.
///
/// The session owns exactly one engine at a time and drives it only through
/// this trait; the engine reports back through the [`EngineEvent`] channel it
/// was built with.
#[async_trait]
pub trait ConnectionEngine: Send + Sync {
    async fn create_data_channel(&self, label: &str) -> Result<()>;

    /// Create an offer that asks to receive both audio and video, even when
    /// no local track is attached.
    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    /// A description of kind `rollback` discards a pending local offer.
    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn add_track(&self, track: Arc<dyn TrackLocal + Send + Sync>) -> Result<()>;

    async fn has_remote_description(&self) -> bool;

    fn signaling_state(&self) -> SignalingState;

    fn connection_state(&self) -> EngineConnectionState;

    async fn close(&self) -> Result<()>;
}

/// Builds engines that all share the same ICE configuration.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn build(
        &self,
        generation: EngineGeneration,
        event_tx: mpsc::Sender<EngineEvent>,
    ) -> Result<Box<dyn ConnectionEngine>>;
}
