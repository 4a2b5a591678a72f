//! # Lantern Node
//!
//! One light node: configuration loading, tracing installation and the
//! wiring of peers, retrieval, indexers and header verification.
//!
//! ```text
//!             ┌──────────── LightNode ────────────┐
//!  Dialer ──▶ │ ServerPool ──▶ PeerSet            │
//!             │                  │                │
//!  Transport ◀┼── RetrieveManager ◀── LightOdr ◀──┼── callers
//!     │       │        ▲                 ▲        │
//!     └───────┼─ deliver        CHT / BloomTrie   │
//!             │                  indexers ◀───────┼── ChainReader
//!             └───────────────────────────────────┘
//! ```

pub mod config;
pub mod node;
pub mod telemetry;

pub use config::{ConfigError, LoggingConfig, NodeConfig, StorageConfig, StorageKind};
pub use node::{LightNode, NodeStatus};
pub use telemetry::{init_tracing, TelemetryError};
