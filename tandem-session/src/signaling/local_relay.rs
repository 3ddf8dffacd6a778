use crate::signaling::SignalingTransport;
use anyhow::{Result, bail};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tandem_core::{RoomId, SignalEnvelope};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DEFAULT_ROOM_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Relayed {
    from: u64,
    envelope: SignalEnvelope,
}

struct RelayInner {
    rooms: DashMap<RoomId, broadcast::Sender<Relayed>>,
    next_client: AtomicU64,
    capacity: usize,
}

/// In-process broadcast relay: one broadcast channel per room.
///
/// Subscribers that fall behind lose envelopes, which is as much delivery
/// guarantee as the real relay gives.
#[derive(Clone)]
pub struct LocalRelay {
    inner: Arc<RelayInner>,
}

impl Default for LocalRelay {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ROOM_CAPACITY)
    }
}

impl LocalRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                rooms: DashMap::new(),
                next_client: AtomicU64::new(1),
                capacity,
            }),
        }
    }

    /// A new participant connection.
    pub fn client(&self) -> LocalRelayClient {
        LocalRelayClient {
            relay: self.clone(),
            client_id: self.inner.next_client.fetch_add(1, Ordering::Relaxed),
            subscription: Mutex::new(None),
        }
    }

    /// Observe every envelope published in `room` from now on.
    pub fn tap(&self, room: &RoomId) -> RelayTap {
        RelayTap {
            rx: self.room_sender(room).subscribe(),
        }
    }

    fn room_sender(&self, room: &RoomId) -> broadcast::Sender<Relayed> {
        self.inner
            .rooms
            .entry(room.clone())
            .or_insert_with(|| {
                info!("Creating relay room: {}", room);
                broadcast::channel(self.inner.capacity).0
            })
            .clone()
    }
}

pub struct RelayTap {
    rx: broadcast::Receiver<Relayed>,
}

impl RelayTap {
    /// Next envelope, skipping over any the tap was too slow to see.
    pub async fn recv(&mut self) -> Option<SignalEnvelope> {
        loop {
            match self.rx.recv().await {
                Ok(relayed) => return Some(relayed.envelope),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

struct Subscription {
    room: RoomId,
    sender: broadcast::Sender<Relayed>,
    forwarder: JoinHandle<()>,
}

/// One participant's connection to a [`LocalRelay`].
pub struct LocalRelayClient {
    relay: LocalRelay,
    client_id: u64,
    subscription: Mutex<Option<Subscription>>,
}

impl LocalRelayClient {
    fn sender(&self) -> Option<broadcast::Sender<Relayed>> {
        let guard = self.subscription.lock().ok()?;
        guard.as_ref().map(|s| s.sender.clone())
    }

    fn take_subscription(&self) -> Option<Subscription> {
        match self.subscription.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

#[async_trait]
impl SignalingTransport for LocalRelayClient {
    async fn subscribe(&self, room: &RoomId, inbox: mpsc::Sender<SignalEnvelope>) -> Result<()> {
        let sender = self.relay.room_sender(room);
        let mut rx = sender.subscribe();
        let own_id = self.client_id;

        let forwarder = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(relayed) if relayed.from == own_id => continue,
                    Ok(relayed) => {
                        if inbox.send(relayed.envelope).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Relay subscriber {} dropped {} envelopes", own_id, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let previous = {
            let mut guard = match self.subscription.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.replace(Subscription {
                room: room.clone(),
                sender,
                forwarder,
            })
        };
        if let Some(previous) = previous {
            debug!("Relay client {} left room {}", own_id, previous.room);
            previous.forwarder.abort();
        }

        debug!("Relay client {} subscribed to room {}", own_id, room);
        Ok(())
    }

    async fn publish(&self, envelope: SignalEnvelope) -> Result<()> {
        let Some(sender) = self.sender() else {
            bail!("Relay client {} is not subscribed", self.client_id);
        };

        // With no receivers left the envelope is simply lost.
        let _ = sender.send(Relayed {
            from: self.client_id,
            envelope,
        });
        Ok(())
    }

    async fn unsubscribe(&self) {
        if let Some(subscription) = self.take_subscription() {
            subscription.forwarder.abort();
            debug!(
                "Relay client {} unsubscribed from room {}",
                self.client_id, subscription.room
            );
        }
    }
}

impl Drop for LocalRelayClient {
    fn drop(&mut self) {
        if let Some(subscription) = self.take_subscription() {
            subscription.forwarder.abort();
        }
    }
}
