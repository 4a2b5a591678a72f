//! Identical immutable requests share one retrieval.

use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::future::join_all;
use lantern_types::Response;

use super::support::{id, Fixture};

#[tokio::test(start_paused = true)]
async fn test_five_identical_requests_one_send() {
    let f = Fixture::new(3, 2, |_| {});
    for byte in 1..=3 {
        f.network.set_delay(id(byte), Duration::from_millis(30));
    }
    let wanted = f.remote[9].clone();

    let results = join_all((0..5).map(|_| f.node.odr().header_by_hash(wanted.hash()))).await;

    assert!(results.iter().all(|r| r.as_ref() == Ok(&wanted)));
    assert_eq!(f.network.sent().len(), 1);
    assert_eq!(f.node.manager().stats().coalesced.load(Ordering::Relaxed), 4);
    assert_eq!(f.node.status().in_flight_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_attempt_shared_by_all_waiters() {
    // The first peer lies; every waiter still gets the value from the retry
    let f = Fixture::new(3, 2, |_| {});
    f.network
        .set_behavior(id(1), lantern_retrieval::test_utils::Behavior::Corrupt);
    let wanted = f.remote[3].clone();

    let results = join_all((0..5).map(|_| f.node.odr().header_by_hash(wanted.hash()))).await;

    assert!(results.iter().all(|r| r.as_ref() == Ok(&wanted)));
    assert_eq!(f.network.sends_to(&id(1)), 1);
    assert_eq!(f.network.sent().len(), 2);
}

#[tokio::test]
async fn test_distinct_requests_spread_over_peers() {
    let f = Fixture::new(3, 2, |_| {});
    for byte in 1..=3 {
        f.network.set_delay(id(byte), Duration::from_millis(20));
    }

    let results = join_all(
        f.remote[..6]
            .iter()
            .map(|h| f.node.odr().header_by_hash(h.hash())),
    )
    .await;
    assert!(results.iter().all(Result::is_ok));

    // Six concurrent requests over three peers with a ceiling of two
    for byte in 1..=3 {
        assert_eq!(f.network.sends_to(&id(byte)), 2);
    }
    assert!(matches!(
        f.node.manager().retrieve(latest(&f)).await,
        Ok(Response::Headers(_))
    ));
}

fn latest(f: &Fixture) -> lantern_retrieval::Request {
    lantern_retrieval::Request::new(
        lantern_types::RequestKind::LatestHeader,
        lantern_retrieval::LatestHeaderValidator::new(0),
        f.node.manager().config(),
    )
}
