//! # Header Verifier
//!
//! Single and batch header verification, plus the engine hooks used when
//! assembling blocks (`author`, `prepare`, `finalize`).

use std::sync::Arc;
use std::thread;

use lantern_types::{
    Address, Block, BlockBody, ChainReader, Header, Receipt, ShutdownSignal, U256,
};
use tracing::{debug, trace};

use crate::batch::{BatchState, BatchVerification};
use crate::config::ConsensusConfig;
use crate::domain::{check_header_rules, ConsensusError};
use crate::seal::SealEngine;
use crate::state::StateDb;
use crate::time::{SystemTimeSource, TimeSource};

/// Header verification engine.
pub struct HeaderVerifier {
    config: ConsensusConfig,
    seal: Arc<dyn SealEngine>,
    clock: Arc<dyn TimeSource>,
    max_workers: usize,
}

impl HeaderVerifier {
    /// Verifier using the wall clock and one worker per available core.
    pub fn new(config: ConsensusConfig, seal: Arc<dyn SealEngine>) -> Self {
        Self {
            config,
            seal,
            clock: Arc::new(SystemTimeSource),
            max_workers: num_cpus::get().max(1),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Cap the batch worker pool.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    /// Rule parameters.
    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// The account credited for producing `header`.
    pub fn author(&self, header: &Header) -> Address {
        header.coinbase
    }

    /// Check that `header` can be built on a known parent.
    pub fn prepare(&self, chain: &dyn ChainReader, header: &Header) -> Result<(), ConsensusError> {
        lookup_parent(chain, header).map(|_| ())
    }

    /// Verify `header` against its parent from `chain`.
    ///
    /// A header the chain already knows is accepted without further checks.
    pub fn verify_header(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        check_seal: bool,
    ) -> Result<(), ConsensusError> {
        if chain.get_header(&header.hash(), header.number).is_some() {
            return Ok(());
        }
        let parent = lookup_parent(chain, header)?;
        self.verify_with_parent(header, &parent, check_seal)
    }

    /// Verify `header` against an explicit parent.
    pub fn verify_with_parent(
        &self,
        header: &Header,
        parent: &Header,
        check_seal: bool,
    ) -> Result<(), ConsensusError> {
        check_header_rules(header, parent, &self.config, self.clock.now())?;
        if check_seal {
            self.seal.verify_seal(header)?;
        }
        trace!(number = header.number, "Header verified");
        Ok(())
    }

    /// Verify a batch in parallel, yielding results in input order.
    ///
    /// Header `i > 0` uses header `i - 1` as its parent when the hashes link,
    /// and fails with `UnknownAncestor` otherwise; header 0's parent comes from
    /// `chain`. A missing seal flag means the seal is checked. Once `stop`
    /// fires no further results are yielded.
    pub fn verify_headers(
        self: &Arc<Self>,
        chain: Arc<dyn ChainReader>,
        headers: Vec<Header>,
        seals: Vec<bool>,
        stop: ShutdownSignal,
    ) -> BatchVerification {
        let len = headers.len();
        let state = Arc::new(BatchState::new(len));
        let workers = self.max_workers.min(len);
        let headers = Arc::new(headers);
        let seals = Arc::new(seals);
        debug!(headers = len, workers, "Verifying header batch");

        let handles = (0..workers)
            .map(|_| {
                let verifier = Arc::clone(self);
                let chain = Arc::clone(&chain);
                let headers = Arc::clone(&headers);
                let seals = Arc::clone(&seals);
                let state = Arc::clone(&state);
                let stop = stop.clone();
                thread::spawn(move || {
                    state.work(&stop, |index| {
                        verifier.verify_batch_item(chain.as_ref(), &headers, &seals, index)
                    });
                })
            })
            .collect();

        BatchVerification::new(state, handles, stop)
    }

    fn verify_batch_item(
        &self,
        chain: &dyn ChainReader,
        headers: &[Header],
        seals: &[bool],
        index: usize,
    ) -> Result<(), ConsensusError> {
        let header = &headers[index];
        if index > 0 && headers[index - 1].hash() != header.parent_hash {
            return Err(unknown_ancestor(header));
        }
        if chain.get_header(&header.hash(), header.number).is_some() {
            return Ok(());
        }
        let parent = if index == 0 {
            lookup_parent(chain, header)?
        } else {
            headers[index - 1].clone()
        };
        let check_seal = seals.get(index).copied().unwrap_or(true);
        self.verify_with_parent(header, &parent, check_seal)
    }

    /// Issuance for the block at `number`.
    pub fn block_reward(&self, number: u64) -> U256 {
        if number >= self.config.reward_transition_block {
            U256::from(self.config.reduced_reward)
        } else {
            U256::from(self.config.initial_reward)
        }
    }

    /// Credit the block reward to the beneficiary, commit the resulting state
    /// root into `header` and assemble the block.
    pub fn finalize(
        &self,
        header: &mut Header,
        state: &mut dyn StateDb,
        body: BlockBody,
        receipts: Vec<Receipt>,
    ) -> Block {
        let reward = self.block_reward(header.number);
        state.add_balance(&header.coinbase, reward);
        header.state_root = state.intermediate_root();
        Block::new(header.clone(), body, receipts)
    }
}

fn unknown_ancestor(header: &Header) -> ConsensusError {
    ConsensusError::UnknownAncestor {
        number: header.number,
        parent_hash: header.parent_hash,
    }
}

fn lookup_parent(chain: &dyn ChainReader, header: &Header) -> Result<Header, ConsensusError> {
    header
        .number
        .checked_sub(1)
        .and_then(|number| chain.get_header(&header.parent_hash, number))
        .ok_or_else(|| unknown_ancestor(header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RuleViolation;
    use crate::seal::{FakeSeal, HashSeal};
    use crate::state::InMemoryState;
    use crate::time::FixedTimeSource;
    use lantern_types::test_utils::{build_chain, child_of, genesis_header, MemoryChain};
    use lantern_types::Shutdown;
    use std::time::{Duration, Instant};

    const NOW: u64 = 1_700_000_000;

    fn verifier(seal: impl SealEngine + 'static) -> Arc<HeaderVerifier> {
        Arc::new(
            HeaderVerifier::new(ConsensusConfig::for_testing(), Arc::new(seal))
                .with_clock(Arc::new(FixedTimeSource::new(NOW))),
        )
    }

    /// Sleeps before accepting the header at one height.
    struct SlowAt(u64, Duration);

    impl SealEngine for SlowAt {
        fn verify_seal(&self, header: &Header) -> Result<(), ConsensusError> {
            if header.number == self.0 {
                thread::sleep(self.1);
            }
            Ok(())
        }
    }

    // =========================================================================
    // TEST GROUP 1: Single header
    // =========================================================================

    #[test]
    fn test_unknown_parent() {
        let chain = MemoryChain::with_length(2);
        let orphan = child_of(&child_of(&genesis_header(), 7), 7);
        let result = verifier(FakeSeal::accept_all()).verify_header(&chain, &orphan, true);
        assert!(matches!(result, Err(ConsensusError::UnknownAncestor { number: 2, .. })));
    }

    #[test]
    fn test_known_header_short_circuits() {
        let chain = MemoryChain::with_length(3);
        let head = chain.current_header();
        // Seal would fail, but the header is already known
        let v = verifier(FakeSeal::fail_at(head.number));
        assert!(v.verify_header(&chain, &head, true).is_ok());
    }

    #[test]
    fn test_seal_checked_only_when_requested() {
        let chain = MemoryChain::with_length(1);
        let next = child_of(&chain.current_header(), 1);
        let v = verifier(FakeSeal::fail_at(next.number));
        assert!(v.verify_header(&chain, &next, false).is_ok());
        assert!(matches!(
            v.verify_header(&chain, &next, true),
            Err(ConsensusError::SealInvalid { number: 2, .. })
        ));
    }

    #[test]
    fn test_hash_seal_end_to_end() {
        let chain = MemoryChain::with_length(1);
        let mut next = child_of(&chain.current_header(), 1);
        next.difficulty = U256::from(8u64);
        let sealed = HashSeal.seal(next);
        assert!(verifier(HashSeal).verify_header(&chain, &sealed, true).is_ok());
    }

    #[test]
    fn test_prepare_and_author() {
        let chain = MemoryChain::with_length(1);
        let v = verifier(FakeSeal::accept_all());
        let next = child_of(&chain.current_header(), 4);
        assert!(v.prepare(&chain, &next).is_ok());
        assert_eq!(v.author(&next), [4u8; 20]);

        let orphan = child_of(&next, 4);
        assert!(matches!(
            v.prepare(&chain, &orphan),
            Err(ConsensusError::UnknownAncestor { .. })
        ));
    }

    // =========================================================================
    // TEST GROUP 2: Batches
    // =========================================================================

    #[test]
    fn test_empty_and_single_batches() {
        let chain: Arc<dyn ChainReader> = Arc::new(MemoryChain::with_length(1));
        let v = verifier(FakeSeal::accept_all());

        let empty = v.verify_headers(Arc::clone(&chain), vec![], vec![], ShutdownSignal::never());
        assert_eq!(empty.worker_count(), 0);
        assert!(empty.results().is_empty());

        let one = child_of(&chain.current_header(), 1);
        let results = v
            .verify_headers(chain, vec![one], vec![true], ShutdownSignal::never())
            .results();
        assert_eq!(results, vec![Ok(())]);
    }

    #[test]
    fn test_batch_order_with_rule_violation_in_middle() {
        let genesis = genesis_header();
        let chain: Arc<dyn ChainReader> = Arc::new(MemoryChain::new(genesis.clone()));
        let mut headers = build_chain(&genesis, 3, 1);
        // h1 breaks the gas-limit delta; h2 relinks to the modified h1
        headers[1].gas_limit = headers[0].gas_limit * 2;
        headers[1].gas_used = 0;
        headers[2] = child_of(&headers[1], 1);

        // h0 is the slowest to verify so later results are ready first
        let v = Arc::new(
            HeaderVerifier::new(
                ConsensusConfig::for_testing(),
                Arc::new(SlowAt(1, Duration::from_millis(80))),
            )
            .with_clock(Arc::new(FixedTimeSource::new(NOW)))
            .with_max_workers(3),
        );
        let results = v
            .verify_headers(chain, headers, vec![true; 3], ShutdownSignal::never())
            .results();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Ok(()));
        assert!(matches!(
            results[1],
            Err(ConsensusError::HeaderRuleViolation(RuleViolation::GasLimitDelta { .. }))
        ));
        assert_eq!(results[2], Ok(()));
    }

    #[test]
    fn test_broken_link_is_unknown_ancestor() {
        let genesis = genesis_header();
        let chain: Arc<dyn ChainReader> = Arc::new(MemoryChain::new(genesis.clone()));
        let mut headers = build_chain(&genesis, 3, 1);
        headers[2].parent_hash = [0xee; 32];

        let results = verifier(FakeSeal::accept_all())
            .verify_headers(chain, headers, vec![true; 3], ShutdownSignal::never())
            .results();
        assert_eq!(&results[..2], &[Ok(()), Ok(())]);
        assert!(matches!(results[2], Err(ConsensusError::UnknownAncestor { number: 3, .. })));
    }

    #[test]
    fn test_known_header_after_broken_link_is_unknown_ancestor() {
        let chain = Arc::new(MemoryChain::with_length(4));
        let known = chain.get_header_by_number(2).unwrap();
        let stranger = child_of(&genesis_header(), 9);
        assert_ne!(stranger.hash(), known.parent_hash);

        let reader: Arc<dyn ChainReader> = chain;
        let results = verifier(FakeSeal::accept_all())
            .verify_headers(reader, vec![stranger, known], vec![true; 2], ShutdownSignal::never())
            .results();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[1], Err(ConsensusError::UnknownAncestor { number: 2, .. })));
    }

    #[test]
    fn test_batch_cancellation_releases_workers() {
        let genesis = genesis_header();
        let chain: Arc<dyn ChainReader> = Arc::new(MemoryChain::new(genesis.clone()));
        let headers = build_chain(&genesis, 64, 1);
        let v = Arc::new(
            HeaderVerifier::new(
                ConsensusConfig::for_testing(),
                Arc::new(FakeSeal::delayed(Duration::from_millis(20))),
            )
            .with_clock(Arc::new(FixedTimeSource::new(NOW)))
            .with_max_workers(4),
        );

        let shutdown = Shutdown::new();
        let mut batch = v.verify_headers(chain, headers, vec![true; 64], shutdown.signal());
        assert_eq!(batch.next(), Some(Ok(())));
        shutdown.trigger();

        let started = Instant::now();
        let rest = batch.results();
        assert!(rest.is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    // =========================================================================
    // TEST GROUP 3: Finalisation
    // =========================================================================

    #[test]
    fn test_reward_era_transition() {
        let v = verifier(FakeSeal::accept_all());
        assert_eq!(v.block_reward(9), U256::from(5_000_000_000_000_000_000u64));
        assert_eq!(v.block_reward(10), U256::from(3_000_000_000_000_000_000u64));
    }

    #[test]
    fn test_finalize_credits_beneficiary_and_commits_root() {
        let v = verifier(FakeSeal::accept_all());
        let mut header = child_of(&genesis_header(), 9);
        let mut state = InMemoryState::new();
        let body = BlockBody {
            transactions: vec![vec![1, 2, 3]],
        };

        let block = v.finalize(&mut header, &mut state, body.clone(), vec![]);

        assert_eq!(state.balance(&[9u8; 20]), v.block_reward(1));
        assert_eq!(header.state_root, state.intermediate_root());
        assert_eq!(block.header.state_root, header.state_root);
        assert_eq!(block.header.tx_root, body.tx_root());
    }
}
