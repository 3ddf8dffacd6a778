use crate::transport::RemoteTrack;
use async_trait::async_trait;
use tandem_core::{ChatMessage, ConnectionStatus};

/// Hooks through which the session reports to the UI layer.
///
/// All hooks are called from the session loop; keep them short.
#[async_trait]
pub trait SessionObserver: Send + Sync {
    async fn on_status(&self, _status: ConnectionStatus, _message: &str) {}

    async fn on_remote_track(&self, _track: RemoteTrack) {}

    /// The peer left; drop whatever media element showed its stream.
    async fn on_remote_media_cleared(&self) {}

    async fn on_chat(&self, _message: ChatMessage) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

#[async_trait]
impl SessionObserver for NoopObserver {}
