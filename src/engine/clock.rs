//! Session clock
//!
//! The scheduling timebase for synchronized starts: monotonically
//! increasing seconds since the clock was created, the native analog of
//! a platform audio context's current time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic time source used to schedule playback
pub trait AudioClock: Send + Sync {
    /// Seconds elapsed since the clock's origin
    fn now(&self) -> f64;
}

/// Wall-clock implementation anchored at creation time
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Settable clock for deterministic tests and headless hosts
///
/// Time only moves when the owner advances it.
#[derive(Debug, Default)]
pub struct ManualClock {
    // Stored as microseconds so the clock is Sync without locking.
    micros: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to an absolute time in seconds
    pub fn set(&self, seconds: f64) {
        self.micros
            .store((seconds * 1_000_000.0) as u64, Ordering::SeqCst);
    }

    /// Move forward by the given number of seconds
    pub fn advance(&self, seconds: f64) {
        self.micros
            .fetch_add((seconds * 1_000_000.0) as u64, Ordering::SeqCst);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        self.micros.load(Ordering::SeqCst) as f64 / 1_000_000.0
    }
}
