//! Time source abstraction.
//!
//! All graph timestamps are milliseconds since the Unix epoch.

use std::sync::atomic::{AtomicU64, Ordering};

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Abstract clock so tests can pin `now`.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by `chrono`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // Pre-epoch clocks are clamped.
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Manually driven clock for deterministic tests.
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicU64,
}

impl FixedClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    /// Move the clock forward and return the new time.
    pub fn advance(&self, millis: u64) -> Timestamp {
        self.now.fetch_add(millis, Ordering::SeqCst) + millis
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
