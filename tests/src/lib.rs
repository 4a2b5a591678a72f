//! # Lantern Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks (proofs, batch verification)
//! └── src/integration/  # End-to-end scenarios over a simulated network
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p lantern-tests
//! cargo test -p lantern-tests integration::coalescing
//! cargo bench -p lantern-tests
//! ```

pub mod integration;
