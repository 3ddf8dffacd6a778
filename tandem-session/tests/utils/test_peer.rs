use std::sync::Arc;
use std::time::Duration;
use tandem_core::{
    ConnectionStatus, IceCandidate, PeerIdentity, SessionDescription, Signal, SignalEnvelope,
    SignalKind,
};
use tandem_session::{Session, SessionConfig, SessionHandle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::mock_engine::MockEngineFactory;
use super::mock_transport::MockTransport;
use super::recording_observer::RecordingObserver;

pub const TEST_ROOM: &str = "test-room";

/// Timeout for waiting on session reactions (ms, virtual time in paused tests).
pub const WAIT_MS: u64 = 5_000;

/// One session wired to mocks, plus everything a test needs to drive it.
pub struct TestPeer {
    pub identity: PeerIdentity,
    pub handle: SessionHandle,
    pub task: JoinHandle<()>,
    pub transport: MockTransport,
    pub published_rx: mpsc::UnboundedReceiver<SignalEnvelope>,
    pub engines: MockEngineFactory,
    pub observer: RecordingObserver,
}

impl TestPeer {
    pub async fn spawn(identity: &str) -> Self {
        Self::spawn_with(identity, MockEngineFactory::new()).await
    }

    /// Spawn a session and wait until its first engine is ready.
    pub async fn spawn_with(identity: &str, engines: MockEngineFactory) -> Self {
        let (transport, published_rx) = MockTransport::new();
        let observer = RecordingObserver::new();
        let identity = PeerIdentity::from(identity);

        let (handle, task) = Session::spawn(
            identity.clone(),
            SessionConfig::for_room(TEST_ROOM),
            Box::new(observer.clone()),
            Arc::new(transport.clone()),
            Arc::new(engines.clone()),
        );

        assert!(
            observer
                .wait_for_status(ConnectionStatus::WaitingForPeer, 1, WAIT_MS)
                .await,
            "session never became ready"
        );

        Self {
            identity,
            handle,
            task,
            transport,
            published_rx,
            engines,
            observer,
        }
    }

    /// Deliver `signal` as if `from` had published it.
    pub async fn receive(&self, from: &str, signal: Signal) {
        self.transport
            .deliver(SignalEnvelope::new(PeerIdentity::from(from), signal))
            .await;
    }

    /// Next published envelope of `kind`, skipping everything else.
    pub async fn next_published(&mut self, kind: SignalKind, timeout_ms: u64) -> Option<SignalEnvelope> {
        let rx = &mut self.published_rx;
        tokio::time::timeout(Duration::from_millis(timeout_ms), async {
            while let Some(envelope) = rx.recv().await {
                if envelope.kind() == kind {
                    return Some(envelope);
                }
            }
            None
        })
        .await
        .ok()
        .flatten()
    }

    /// Forget everything published so far.
    pub fn drain_published(&mut self) {
        while self.published_rx.try_recv().is_ok() {}
    }

    /// Give the session loop a chance to process what was delivered.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

pub fn offer(sdp: &str) -> Signal {
    Signal::Offer {
        sdp: SessionDescription::offer(sdp),
    }
}

pub fn answer(sdp: &str) -> Signal {
    Signal::Answer {
        sdp: SessionDescription::answer(sdp),
    }
}

pub fn candidate(candidate: &str) -> Signal {
    Signal::IceCandidate {
        candidate: IceCandidate::new(candidate),
    }
}
