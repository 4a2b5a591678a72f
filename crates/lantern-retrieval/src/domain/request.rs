//! # Request Descriptor

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use lantern_types::RequestKind;

use crate::config::RetrievalConfig;
use crate::validation::ResponseValidator;

/// An immutable retrieval: what to fetch, how to check it, and how hard to
/// try. Each retry sends the same descriptor to a different peer.
#[derive(Clone)]
pub struct Request {
    /// What is fetched.
    pub kind: RequestKind,
    /// Check applied to every reply.
    pub validator: Arc<dyn ResponseValidator>,
    /// Per-attempt reply deadline.
    pub timeout: Duration,
    /// Maximum attempts, at least one.
    pub retry_budget: u32,
    /// Lowest advertised head a serving peer must have.
    pub min_head: u64,
}

impl Request {
    /// Descriptor using the configured deadline and class budget.
    pub fn new(
        kind: RequestKind,
        validator: impl ResponseValidator + 'static,
        config: &RetrievalConfig,
    ) -> Self {
        let retry_budget = config.budgets.for_class(kind.class()).max(1);
        let min_head = required_head(&kind);
        Self {
            kind,
            validator: Arc::new(validator),
            timeout: config.request_timeout(),
            retry_budget,
            min_head,
        }
    }

    /// Override the per-attempt deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the attempt budget.
    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget.max(1);
        self
    }

    /// Require serving peers to be at or past `head`.
    pub fn with_min_head(mut self, head: u64) -> Self {
        self.min_head = head;
        self
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("kind", &self.kind)
            .field("timeout", &self.timeout)
            .field("retry_budget", &self.retry_budget)
            .field("min_head", &self.min_head)
            .finish_non_exhaustive()
    }
}

fn required_head(kind: &RequestKind) -> u64 {
    match kind {
        RequestKind::HeaderByNumber { number }
        | RequestKind::BlockBody { number, .. }
        | RequestKind::Receipts { number, .. }
        | RequestKind::ChtProof { number, .. } => *number,
        _ => 0,
    }
}
