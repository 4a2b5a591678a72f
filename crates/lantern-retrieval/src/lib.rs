//! # Lantern Retrieval
//!
//! Fetches headers, bodies, receipts and proofs from untrusted peers and
//! returns only what verifies against locally trusted anchors.
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`RequestDistributor`] | Picks the least-loaded, best-reputed eligible peer; parks when none qualifies |
//! | [`RetrieveManager`] | Send, deadline, validate, retry on another peer; coalesces identical immutable requests |
//! | [`ResponseValidator`] | Hash, root and Merkle-proof checks per request kind |
//! | [`LightOdr`] | Typed retrievals anchored to the local chain and sealed checkpoints |
//!
//! Replies from the network enter through [`RetrieveManager::deliver`].

pub mod config;
pub mod distributor;
pub mod domain;
pub mod manager;
pub mod metrics;
pub mod odr;
mod pending;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{RetrievalConfig, RetryBudgets};
pub use distributor::{Eligibility, PeerLease, RequestDistributor};
pub use domain::{DistributionError, Request, RetrievalError, ValidationError};
pub use manager::{RetrievalStats, RetrieveManager};
pub use odr::LightOdr;
pub use pending::Delivery;
pub use validation::{
    account_key, storage_key, BloomTrieValidator, BodyValidator, ChtProofValidator,
    HeaderHashValidator, HeaderNumberValidator, LatestHeaderValidator, ReceiptsValidator,
    ResponseValidator, StateProofValidator,
};
