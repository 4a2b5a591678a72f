//! Bounded retries against lying peers.

use lantern_retrieval::test_utils::Behavior;
use lantern_retrieval::RetrievalError;

use super::support::{id, Fixture};

#[tokio::test]
async fn test_always_invalid_stops_at_budget() {
    let f = Fixture::new(5, 2, |config| config.retrieval.budgets.header = 3);
    for byte in 1..=5 {
        f.network.set_behavior(id(byte), Behavior::Corrupt);
    }

    let err = f
        .node
        .odr()
        .header_by_hash(f.remote[7].hash())
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        RetrievalError::RetrievalFailed { attempts: 3, last_error, .. }
            if matches!(**last_error, RetrievalError::InvalidResponse { .. })
    ));
    assert_eq!(f.network.sent().len(), 3);
    // Each peer was tried at most once
    for byte in 1..=5 {
        assert!(f.network.sends_to(&id(byte)) <= 1);
    }
}

#[tokio::test]
async fn test_success_on_third_attempt_stops_retrying() {
    let f = Fixture::new(5, 2, |config| config.retrieval.budgets.header = 4);
    f.network.set_behavior(id(1), Behavior::Corrupt);
    f.network.set_behavior(id(2), Behavior::Corrupt);

    let wanted = f.remote[7].clone();
    assert_eq!(f.node.odr().header_by_hash(wanted.hash()).await.unwrap(), wanted);
    assert_eq!(f.network.sent().len(), 3);
    assert_eq!(f.network.sends_to(&id(4)), 0);

    // Liars lose standing, the honest peer gains it
    let reputation = f.node.pool().reputation();
    assert!(reputation.score(&id(1)) < 0.0);
    assert!(reputation.score(&id(3)) > 0.0);
}

#[tokio::test]
async fn test_unsolicited_reply_never_completes_a_request() {
    let f = Fixture::new(1, 2, |_| {});
    let before = f.node.pool().reputation().score(&id(1));

    f.network.inject(
        &id(1),
        lantern_types::RequestId::new_v4(),
        lantern_types::Response::Headers(vec![f.remote[0].clone()]),
    );

    assert_eq!(f.node.status().in_flight_requests, 0);
    assert!(f.node.pool().reputation().score(&id(1)) < before);
}
