//! Monotonic time source and the drag re-sync throttle.
//!
//! Timestamps are plain [`Duration`]s since an arbitrary origin so the
//! overlay can be driven by a real clock in the browser and by scripted
//! timestamps in tests and the CLI.

use std::cell::Cell;
use std::time::Duration;

/// A monotonic time source.
pub trait Clock {
    /// Time elapsed since this clock's origin.
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by [`web_time::Instant`].
///
/// Uses `performance.now()` on WASM and `std::time::Instant` on native.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: web_time::Instant,
}

impl SystemClock {
    /// Start a clock whose origin is the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: web_time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// [`Clock`] that only advances when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    /// Create a clock reading zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to an absolute time. Going backwards is ignored.
    pub fn set(&self, now: Duration) {
        if now > self.now.get() {
            self.now.set(now);
        }
    }

    /// Advance by `step`.
    pub fn advance(&self, step: Duration) {
        self.now.set(self.now.get() + step);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Rate limiter for celestial re-sampling during whole-shape drags.
///
/// Pixel positions always move immediately; only the (comparatively
/// expensive) transform calls are throttled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncThrottle {
    interval: Duration,
    last: Option<Duration>,
}

impl SyncThrottle {
    /// Create a throttle allowing one sync per `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns `true` (and records `now`) if a sync is allowed.
    pub fn try_acquire(&mut self, now: Duration) -> bool {
        let allowed = self
            .last
            .is_none_or(|last| now.saturating_sub(last) >= self.interval);
        if allowed {
            self.last = Some(now);
        }
        allowed
    }

    /// Time of the last permitted sync, if any.
    #[must_use]
    pub const fn last_sync(&self) -> Option<Duration> {
        self.last
    }
}
