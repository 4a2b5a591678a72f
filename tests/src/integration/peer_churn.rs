//! Peers leaving mid-request and peers dropped for misbehaviour.

use std::time::Duration;

use lantern_peers::DisconnectReason;
use lantern_retrieval::test_utils::Behavior;
use tokio::time::Instant;

use super::support::{id, Fixture};

#[tokio::test(start_paused = true)]
async fn test_disconnect_fails_over_without_waiting_for_deadline() {
    let f = Fixture::new(2, 2, |config| config.retrieval.request_timeout_ms = 10_000);
    f.network.set_behavior(id(1), Behavior::Disconnect);

    let started = Instant::now();
    let wanted = f.remote[2].clone();
    assert_eq!(f.node.odr().header_by_hash(wanted.hash()).await.unwrap(), wanted);

    assert!(started.elapsed() < Duration::from_millis(100));
    assert!(!f.node.peers().contains(&id(1)));
    // Leaving is not misbehaviour
    assert!(f.node.pool().reputation().get(&id(1)).is_none());
}

#[tokio::test]
async fn test_repeat_liar_is_dropped_and_disconnected() {
    // Two invalid replies cross the test drop threshold. Without reputation
    // weighting the liar keeps winning the id tie-break.
    let f = Fixture::new(2, 2, |config| config.retrieval.reputation_weight = 0.0);
    f.network.set_behavior(id(1), Behavior::Corrupt);

    for header in &f.remote[..2] {
        f.node.odr().header_by_hash(header.hash()).await.unwrap();
        if !f.node.peers().contains(&id(1)) {
            break;
        }
    }

    assert!(!f.node.peers().contains(&id(1)));
    assert!(f
        .network
        .disconnects()
        .contains(&(id(1), DisconnectReason::Dropped)));
    assert_eq!(f.node.status().connected_peers, 1);

    // Later requests only reach the honest peer
    f.node.odr().header_by_hash(f.remote[5].hash()).await.unwrap();
    assert_eq!(f.network.sent().last().unwrap().0, id(2));
}
