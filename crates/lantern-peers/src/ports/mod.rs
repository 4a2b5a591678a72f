//! Ports the peer layer needs from the outside world.

pub mod outbound;

pub use outbound::{Dialer, PeerScorer, PeerTransport};
