//! Pure peer types and reputation rules.

pub mod errors;
pub mod peer;
pub mod reputation;

pub use errors::{DialError, PeerSetError, PoolError, TransportError};
pub use peer::{DisconnectReason, Peer, PeerCandidate, PeerEvent, PeerInfo};
pub use reputation::{Outcome, ReputationRecord, Standing};
