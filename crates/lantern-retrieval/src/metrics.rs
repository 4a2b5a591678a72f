//! # Retrieval Metrics
//!
//! Prometheus counters for the retrieve manager.
//!
//! Enable with the `metrics` feature:
//! ```toml
//! lantern-retrieval = { path = "...", features = ["metrics"] }
//! ```
//!
//! - `lantern_retrieval_wire_sends_total` - Requests sent to peers
//! - `lantern_retrieval_timeouts_total` - Attempts that hit their deadline
//! - `lantern_retrieval_invalid_responses_total` - Replies rejected by a validator
//! - `lantern_retrieval_coalesced_total` - Callers that joined an in-flight retrieval
//! - `lantern_retrieval_unsolicited_total` - Replies nobody was waiting for

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, IntCounter};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref WIRE_SENDS: IntCounter = register_int_counter!(
        "lantern_retrieval_wire_sends_total",
        "Requests sent to peers"
    )
    .expect("Failed to create WIRE_SENDS metric");

    pub static ref TIMEOUTS: IntCounter = register_int_counter!(
        "lantern_retrieval_timeouts_total",
        "Attempts that hit their reply deadline"
    )
    .expect("Failed to create TIMEOUTS metric");

    pub static ref INVALID_RESPONSES: IntCounter = register_int_counter!(
        "lantern_retrieval_invalid_responses_total",
        "Replies rejected by a validator"
    )
    .expect("Failed to create INVALID_RESPONSES metric");

    pub static ref COALESCED: IntCounter = register_int_counter!(
        "lantern_retrieval_coalesced_total",
        "Callers that joined an in-flight retrieval"
    )
    .expect("Failed to create COALESCED metric");

    pub static ref UNSOLICITED: IntCounter = register_int_counter!(
        "lantern_retrieval_unsolicited_total",
        "Replies that matched no in-flight attempt"
    )
    .expect("Failed to create UNSOLICITED metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

#[cfg(feature = "metrics")]
pub fn record_wire_send() {
    WIRE_SENDS.inc();
}

#[cfg(feature = "metrics")]
pub fn record_timeout() {
    TIMEOUTS.inc();
}

#[cfg(feature = "metrics")]
pub fn record_invalid_response() {
    INVALID_RESPONSES.inc();
}

#[cfg(feature = "metrics")]
pub fn record_coalesced() {
    COALESCED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_unsolicited() {
    UNSOLICITED.inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_wire_send() {}

#[cfg(not(feature = "metrics"))]
pub fn record_timeout() {}

#[cfg(not(feature = "metrics"))]
pub fn record_invalid_response() {}

#[cfg(not(feature = "metrics"))]
pub fn record_coalesced() {}

#[cfg(not(feature = "metrics"))]
pub fn record_unsolicited() {}
