//! # Indexer Metrics
//!
//! Enable with the `metrics` feature.
//!
//! - `lantern_indexer_sections_sealed_total` - Sealed sections, labeled by indexer

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter_vec, IntCounterVec};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Sections sealed, labeled by indexer
    pub static ref SECTIONS_SEALED: IntCounterVec = register_int_counter_vec!(
        "lantern_indexer_sections_sealed_total",
        "Checkpoint sections sealed",
        &["indexer"]
    )
    .expect("Failed to create SECTIONS_SEALED metric");
}

/// Record one sealed section.
#[cfg(feature = "metrics")]
pub fn record_section_sealed(indexer: &str) {
    SECTIONS_SEALED.with_label_values(&[indexer]).inc();
}

#[cfg(not(feature = "metrics"))]
pub fn record_section_sealed(_indexer: &str) {}
