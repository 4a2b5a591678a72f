//! # Ordered Batch Verification
//!
//! Fan-out over a fixed pool of worker threads, ordered fan-in through a
//! slot array.
//!
//! Workers claim the next unverified index from an atomic counter and write
//! their outcome into `slots[index]`. The consumer keeps a cursor and only
//! yields `slots[cursor]` once it is filled, so results always come out in
//! input order whatever order workers finish in. Slots are preallocated, so
//! a worker never waits on the consumer and can always exit.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use lantern_types::ShutdownSignal;
use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::domain::ConsensusError;

/// Outcome of one header.
pub type VerifyResult = Result<(), ConsensusError>;

const STOP_POLL: Duration = Duration::from_millis(10);

pub(crate) struct BatchState {
    slots: Mutex<Vec<Option<VerifyResult>>>,
    ready: Condvar,
    next: AtomicUsize,
    aborted: AtomicBool,
    len: usize,
}

impl BatchState {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            slots: Mutex::new((0..len).map(|_| None).collect()),
            ready: Condvar::new(),
            next: AtomicUsize::new(0),
            aborted: AtomicBool::new(false),
            len,
        }
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        let _guard = self.slots.lock();
        self.ready.notify_all();
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Worker body: verify indices until the batch is exhausted or aborted.
    pub(crate) fn work(&self, stop: &ShutdownSignal, verify: impl Fn(usize) -> VerifyResult) {
        loop {
            if self.is_aborted() || stop.is_triggered() {
                return;
            }
            let index = self.next.fetch_add(1, Ordering::AcqRel);
            if index >= self.len {
                return;
            }
            let result = verify(index);
            let mut slots = self.slots.lock();
            slots[index] = Some(result);
            self.ready.notify_all();
        }
    }
}

/// Handle over an in-progress batch. Iterating yields results in input order.
///
/// Dropping the handle aborts outstanding work and joins every worker.
pub struct BatchVerification {
    state: Arc<BatchState>,
    workers: Vec<JoinHandle<()>>,
    stop: ShutdownSignal,
    cursor: usize,
}

impl BatchVerification {
    pub(crate) fn new(
        state: Arc<BatchState>,
        workers: Vec<JoinHandle<()>>,
        stop: ShutdownSignal,
    ) -> Self {
        Self {
            state,
            workers,
            stop,
            cursor: 0,
        }
    }

    /// Number of headers in the batch.
    pub fn len(&self) -> usize {
        self.state.len
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.state.len == 0
    }

    /// Number of worker threads spawned.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Abandon outstanding work. No further results are yielded.
    pub fn abort(&self) {
        self.state.abort();
    }

    /// Drain the remaining results (a prefix if aborted).
    pub fn results(mut self) -> Vec<VerifyResult> {
        let mut out = Vec::with_capacity(self.state.len - self.cursor);
        out.extend(&mut self);
        out
    }
}

impl Iterator for BatchVerification {
    type Item = VerifyResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.state.len {
            return None;
        }
        let mut slots = self.state.slots.lock();
        loop {
            if self.stop.is_triggered() {
                drop(slots);
                self.state.abort();
                return None;
            }
            if self.state.is_aborted() {
                return None;
            }
            if let Some(result) = slots[self.cursor].take() {
                self.cursor += 1;
                return Some(result);
            }
            self.state.ready.wait_for(&mut slots, STOP_POLL);
        }
    }
}

impl Drop for BatchVerification {
    fn drop(&mut self) {
        self.state.abort();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                debug!("Header verification worker panicked");
            }
        }
    }
}
