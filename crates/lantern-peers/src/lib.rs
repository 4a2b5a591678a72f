//! # Lantern Peers
//!
//! Who we can ask, and how much we trust them.
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`PeerSet`] | Registry of connected serving peers and their load |
//! | [`ReputationTable`] | Persisted per-peer score, single writer per record |
//! | [`ServerPool`] | Dials candidates by reputation, backs off, drops misbehaving peers |
//!
//! ## Module Structure
//!
//! ```text
//! lantern-peers/
//! ├── domain/             # Peer, PeerInfo, ReputationRecord, errors
//! ├── ports/              # PeerTransport, Dialer, PeerScorer
//! ├── peer_set.rs         # PeerSet + Reservation
//! ├── reputation_table.rs # ReputationTable
//! ├── server_pool.rs      # ServerPool
//! └── config.rs           # PeerSetConfig, ReputationConfig, ServerPoolConfig
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod domain;
pub mod peer_set;
pub mod ports;
pub mod reputation_table;
pub mod server_pool;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{PeerSetConfig, ReputationConfig, ServerPoolConfig};
pub use domain::{
    DialError, DisconnectReason, Outcome, Peer, PeerCandidate, PeerEvent, PeerInfo,
    PeerSetError, PoolError, ReputationRecord, Standing, TransportError,
};
pub use peer_set::{PeerSet, Reservation};
pub use ports::{Dialer, PeerScorer, PeerTransport};
pub use reputation_table::{ReputationTable, REPUTATION_PREFIX};
pub use server_pool::{parse_bootnode, ServerPool};
