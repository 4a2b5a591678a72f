//! # Shutdown Signal
//!
//! A single stop trigger observed by every long-running loop. Built on a
//! `tokio::sync::watch` channel so late subscribers still see the trigger.

use std::sync::Arc;

use tokio::sync::watch;

/// Owner of the stop trigger.
#[derive(Debug)]
pub struct Shutdown {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    /// Create an untriggered shutdown.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// A receiver that observes this shutdown.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
            _keepalive: None,
        }
    }

    /// Fire the trigger. Idempotent.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    /// Whether the trigger has fired.
    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Cloneable observer of a [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
    _keepalive: Option<Arc<watch::Sender<bool>>>,
}

impl ShutdownSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            receiver,
            _keepalive: Some(Arc::new(sender)),
        }
    }

    /// Whether the trigger has fired (or the owner is gone).
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow() || self.receiver.has_changed().is_err()
    }

    /// Resolve once the trigger fires. A dropped owner counts as fired.
    pub async fn triggered(&mut self) {
        let _ = self.receiver.wait_for(|stopped| *stopped).await;
    }
}
