//! # Lantern Consensus
//!
//! Verifies that headers obey the chain rules before anything downstream
//! trusts them.
//!
//! - [`HeaderVerifier::verify_header`] checks one header against its parent.
//! - [`HeaderVerifier::verify_headers`] verifies a batch on a worker pool and
//!   yields results strictly in input order.
//! - [`HeaderVerifier::finalize`] credits the era reward and commits the state
//!   root.
//!
//! Rule order: extra-data length, future timestamp, timestamp after parent,
//! gas-limit ceiling, gas used within limit, gas-limit delta and floor,
//! number, then the seal.

pub mod batch;
pub mod config;
pub mod domain;
pub mod seal;
pub mod state;
pub mod time;
pub mod verifier;

pub use batch::{BatchVerification, VerifyResult};
pub use config::{ConsensusConfig, MAX_GAS_LIMIT};
pub use domain::{check_header_rules, ConsensusError, RuleViolation};
pub use seal::{FakeSeal, HashSeal, SealEngine};
pub use state::{InMemoryState, StateDb};
pub use time::{FixedTimeSource, SystemTimeSource, TimeSource};
pub use verifier::HeaderVerifier;
