use std::time::Duration;
use tandem_core::{ConnectionStatus, Signal, SignalKind};
use tandem_session::{EngineConnectionState, SessionTiming};
use tokio::time::Instant;

use crate::integration::init_tracing;
use crate::utils::{TestPeer, WAIT_MS, answer};

#[tokio::test(start_paused = true)]
async fn test_unanswered_offer_restarts_and_resumes_announcing() {
    init_tracing();

    let timing = SessionTiming::default();
    let mut peer = TestPeer::spawn("b1").await;

    peer.receive("a9", Signal::Announce).await;
    peer.next_published(SignalKind::Offer, WAIT_MS)
        .await
        .expect("b1 should offer");
    let offered_at = Instant::now();

    let announce = peer
        .next_published(SignalKind::Announce, 20_000)
        .await
        .expect("announcing should resume after the timeout");
    let elapsed = offered_at.elapsed();

    assert_eq!(announce.sender_id, peer.identity);
    assert!(elapsed >= timing.negotiation_timeout(), "restarted early: {elapsed:?}");
    assert!(
        elapsed
            <= timing.negotiation_timeout()
                + timing.announce_initial_delay()
                + timing.announce_period(),
        "announce took too long: {elapsed:?}"
    );

    assert_eq!(peer.engines.built(), 2);
    assert!(peer.engines.probe(1).is_closed());
    assert!(!peer.engines.probe(2).is_closed());

    let statuses = peer.observer.statuses().await;
    let reconnecting = statuses
        .iter()
        .rposition(|s| *s == ConnectionStatus::Reconnecting)
        .expect("restart should report reconnecting");
    assert_eq!(
        statuses[reconnecting + 1..],
        [ConnectionStatus::WaitingForPeer]
    );
}

#[tokio::test(start_paused = true)]
async fn test_connected_session_cancels_timeout() {
    init_tracing();

    let mut peer = TestPeer::spawn("b1").await;
    peer.receive("a9", Signal::Announce).await;
    peer.next_published(SignalKind::Offer, WAIT_MS)
        .await
        .expect("b1 should offer");

    peer.receive("a9", answer("v=0 answer")).await;
    peer.settle().await;
    peer.engines
        .probe(1)
        .set_connection_state(EngineConnectionState::Connected)
        .await;

    assert!(
        peer.observer
            .wait_for_status(ConnectionStatus::Connected, 1, WAIT_MS)
            .await
    );

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(peer.engines.built(), 1);
    assert_eq!(
        peer.observer.last_status().await,
        Some(ConnectionStatus::Connected)
    );
}
