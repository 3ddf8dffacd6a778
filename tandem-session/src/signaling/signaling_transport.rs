use anyhow::Result;
use async_trait::async_trait;
use tandem_core::{RoomId, SignalEnvelope};
use tokio::sync::mpsc;

/// Publish/subscribe relay the two participants rendezvous on.
///
/// Best-effort: envelopes may be lost, duplicated or reordered across
/// senders. A single sender's envelopes are assumed to arrive in send order.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Deliver every envelope other participants publish in `room` to `inbox`.
    async fn subscribe(&self, room: &RoomId, inbox: mpsc::Sender<SignalEnvelope>) -> Result<()>;

    async fn publish(&self, envelope: SignalEnvelope) -> Result<()>;

    /// Release the subscription. Calling it twice is fine.
    async fn unsubscribe(&self);
}
