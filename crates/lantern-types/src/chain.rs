//! Read access to the locally verified canonical header chain.

use tokio::sync::broadcast;

use crate::entities::{Hash, Header};

/// Notification emitted when the canonical chain changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// A new canonical head. A head whose parent is not the previous head
    /// signals a reorganisation.
    Head(Header),
}

/// Canonical chain observer.
///
/// Implemented by the header chain that owns local storage; the retrieval
/// layer only reads from it.
pub trait ChainReader: Send + Sync {
    /// The current canonical head.
    fn current_header(&self) -> Header;

    /// Any known header by hash and number, canonical or not.
    fn get_header(&self, hash: &Hash, number: u64) -> Option<Header>;

    /// The canonical header at `number`.
    fn get_header_by_number(&self, number: u64) -> Option<Header>;

    /// Subscribe to head changes.
    fn subscribe(&self) -> broadcast::Receiver<ChainEvent>;
}
