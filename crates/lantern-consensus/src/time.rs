//! Clock port for future-timestamp checks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current unix time in seconds.
pub trait TimeSource: Send + Sync {
    /// Seconds since the unix epoch.
    fn now(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Manually driven clock for tests.
#[derive(Debug, Default)]
pub struct FixedTimeSource(AtomicU64);

impl FixedTimeSource {
    /// Clock stopped at `now`.
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    /// Move the clock.
    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::Relaxed);
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
