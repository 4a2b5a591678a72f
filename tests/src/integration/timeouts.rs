//! Deadlines, and what happens when no alternate peer exists.

use std::sync::atomic::Ordering;
use std::time::Duration;

use lantern_retrieval::test_utils::Behavior;
use lantern_retrieval::RetrievalError;
use tokio::time::Instant;

use super::support::{id, Fixture};

#[tokio::test(start_paused = true)]
async fn test_silent_single_peer_times_out_then_fails() {
    let f = Fixture::new(1, 2, |config| {
        config.retrieval.request_timeout_ms = 100;
        config.retrieval.distribution_wait_ms = 40;
        config.retrieval.budgets.header = 3;
    });
    f.network.set_behavior(id(1), Behavior::Silent);

    let started = Instant::now();
    let err = f.node.odr().header_by_hash(f.remote[0].hash()).await.unwrap_err();
    let elapsed = started.elapsed();

    match err {
        RetrievalError::RetrievalFailed {
            attempts,
            last_peer,
            last_error,
            ..
        } => {
            assert_eq!(attempts, 1);
            assert_eq!(last_peer, Some(id(1)));
            assert!(matches!(
                *last_error,
                RetrievalError::Timeout { after_ms: 100, .. }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(elapsed >= Duration::from_millis(140));
    assert!(elapsed < Duration::from_millis(180));

    let record = f.node.pool().reputation().get(&id(1)).unwrap();
    assert_eq!(record.timeouts_in_row, 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_peer_replaced_by_fast_one() {
    let f = Fixture::new(2, 2, |config| config.retrieval.request_timeout_ms = 100);
    f.network.set_delay(id(1), Duration::from_millis(500));

    let wanted = f.remote[5].clone();
    assert_eq!(f.node.odr().header_by_hash(wanted.hash()).await.unwrap(), wanted);
    assert_eq!(f.network.sends_to(&id(1)), 1);
    assert_eq!(f.network.sends_to(&id(2)), 1);

    // Peer 1's reply lands after its deadline: dropped, not penalised twice
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(f.node.manager().pending_attempts(), 0);
    assert_eq!(f.node.manager().stats().unsolicited.load(Ordering::Relaxed), 0);
    let record = f.node.pool().reputation().get(&id(1)).unwrap();
    assert_eq!(record.timeouts_in_row, 1);
    assert_eq!(record.successes, 0);
}

#[tokio::test(start_paused = true)]
async fn test_no_peers_fails_after_distribution_wait() {
    let f = Fixture::new(0, 2, |config| config.retrieval.distribution_wait_ms = 250);

    let started = Instant::now();
    let err = f.node.odr().latest_header().await.unwrap_err();
    assert!(matches!(err, RetrievalError::NoEligiblePeer { .. }));
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert!(f.network.sent().is_empty());
}
