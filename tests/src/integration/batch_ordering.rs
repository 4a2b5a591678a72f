//! Ordered results from parallel header verification.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lantern_consensus::{
    ConsensusConfig, ConsensusError, HeaderVerifier, RuleViolation, SealEngine,
};
use lantern_types::test_utils::{build_chain, MemoryChain};
use lantern_types::{ChainReader, Header, Shutdown};

/// Seal engine that stalls on one block number.
struct StallAt {
    number: u64,
    delay: Duration,
}

impl SealEngine for StallAt {
    fn verify_seal(&self, header: &Header) -> Result<(), ConsensusError> {
        if header.number == self.number {
            std::thread::sleep(self.delay);
        }
        Ok(())
    }
}

fn verifier(seal: impl SealEngine + 'static) -> Arc<HeaderVerifier> {
    Arc::new(HeaderVerifier::new(ConsensusConfig::for_testing(), Arc::new(seal)).with_max_workers(3))
}

#[test]
fn test_rule_violation_reported_in_position() {
    let chain: Arc<dyn ChainReader> = Arc::new(MemoryChain::with_length(5));
    let mut headers = build_chain(&chain.current_header(), 3, 1);
    // h1 doubles its gas limit, h2 is relinked to the modified h1
    headers[1].gas_limit *= 2;
    headers[2].parent_hash = headers[1].hash();

    let verifier = verifier(StallAt {
        number: headers[0].number,
        delay: Duration::from_millis(100),
    });
    let results = verifier
        .verify_headers(chain, headers, vec![true; 3], Shutdown::new().signal())
        .results();

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(ConsensusError::HeaderRuleViolation(RuleViolation::GasLimitDelta { .. }))
    ));
    // h2 drops back to the original limit, too far from h1's
    assert!(matches!(
        results[2],
        Err(ConsensusError::HeaderRuleViolation(RuleViolation::GasLimitDelta { .. }))
    ));
}

#[test]
fn test_unlinked_header_is_unknown_ancestor() {
    let chain: Arc<dyn ChainReader> = Arc::new(MemoryChain::with_length(2));
    let mut headers = build_chain(&chain.current_header(), 3, 2);
    headers[2].parent_hash = [0xee; 32];

    let results = verifier(StallAt {
        number: 0,
        delay: Duration::ZERO,
    })
    .verify_headers(chain, headers, vec![], Shutdown::new().signal())
    .results();

    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(matches!(results[2], Err(ConsensusError::UnknownAncestor { .. })));
}

#[test]
fn test_cancel_releases_workers_promptly() {
    let chain: Arc<dyn ChainReader> = Arc::new(MemoryChain::with_length(1));
    let headers = build_chain(&chain.current_header(), 12, 3);
    let slow = verifier(StallAt {
        number: 2,
        delay: Duration::from_millis(300),
    });

    let shutdown = Shutdown::new();
    let mut batch = slow.verify_headers(chain, headers, vec![true; 12], shutdown.signal());
    assert!(batch.next().unwrap().is_ok());

    let started = Instant::now();
    shutdown.trigger();
    let rest: Vec<_> = batch.collect();
    assert!(rest.is_empty());
    // Consuming the handle joined every worker, the stalled one included
    assert!(started.elapsed() < Duration::from_secs(2));
}
