use std::time::Duration;
use tandem_core::{ConnectionStatus, PeerIdentity, SdpKind, Signal, SignalKind};

use crate::integration::init_tracing;
use crate::utils::{EngineCall, TestPeer, WAIT_MS};

#[tokio::test(start_paused = true)]
async fn test_greater_identity_sends_offer() {
    init_tracing();

    let mut peer = TestPeer::spawn("b1").await;
    peer.receive("a9", Signal::Announce).await;

    let offer = peer
        .next_published(SignalKind::Offer, WAIT_MS)
        .await
        .expect("b1 should offer to a9");
    assert_eq!(offer.sender_id, peer.identity);
    peer.settle().await;

    let calls = peer.engines.probe(1).calls();
    assert_eq!(
        calls,
        vec![
            EngineCall::CreateDataChannel("chat".to_owned()),
            EngineCall::CreateOffer,
            EngineCall::SetLocal(SdpKind::Offer),
        ]
    );
    assert_eq!(
        peer.observer.last_status().await,
        Some(ConnectionStatus::Negotiating)
    );
}

#[tokio::test(start_paused = true)]
async fn test_smaller_identity_never_offers_and_keeps_announcing() {
    init_tracing();

    let peer = TestPeer::spawn("a9").await;
    for _ in 0..3 {
        peer.receive("b1", Signal::Announce).await;
    }

    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(peer.transport.count_of(SignalKind::Offer).await, 0);
    assert!(peer.transport.count_of(SignalKind::Announce).await >= 2);
    assert!(peer.engines.probe(1).calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_announces_produce_one_offer() {
    init_tracing();

    let mut peer = TestPeer::spawn("b1").await;
    for _ in 0..4 {
        peer.receive("a9", Signal::Announce).await;
    }

    peer.next_published(SignalKind::Offer, WAIT_MS)
        .await
        .expect("b1 should offer");
    peer.settle().await;

    assert_eq!(peer.transport.count_of(SignalKind::Offer).await, 1);
    let offers_created = peer
        .engines
        .probe(1)
        .calls()
        .into_iter()
        .filter(|c| *c == EngineCall::CreateOffer)
        .count();
    assert_eq!(offers_created, 1);
}

#[tokio::test(start_paused = true)]
async fn test_exactly_one_side_initiates_for_random_identities() {
    init_tracing();

    for _ in 0..5 {
        let first = PeerIdentity::generate();
        let second = PeerIdentity::generate();

        let one = TestPeer::spawn(first.as_str()).await;
        let two = TestPeer::spawn(second.as_str()).await;

        one.receive(second.as_str(), Signal::Announce).await;
        two.receive(first.as_str(), Signal::Announce).await;
        one.settle().await;
        two.settle().await;

        let one_offered = one.transport.count_of(SignalKind::Offer).await == 1;
        let two_offered = two.transport.count_of(SignalKind::Offer).await == 1;

        assert_ne!(one_offered, two_offered, "exactly one side must offer");
        assert_eq!(one_offered, first > second);

        one.handle.leave().await.unwrap();
        two.handle.leave().await.unwrap();
    }
}
