// SPDX-License-Identifier: MIT

//! Clock abstraction so durations and timestamps are deterministic in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of time for components that need to stamp records or measure
/// elapsed durations. Real code uses [`SystemClock`]; tests use [`FakeClock`]
/// to get reproducible timestamps and backoff windows.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64;

    /// A monotonic instant, for measuring elapsed durations.
    fn now(&self) -> Instant;
}

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic clock for tests: `epoch_ms` is controlled explicitly,
/// `now()` still delegates to `Instant::now()` since `Instant` cannot be
/// fabricated, but callers compare durations rather than absolute instants.
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    epoch_ms: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new(epoch_ms: u64) -> Self {
        Self {
            epoch_ms: Arc::new(AtomicU64::new(epoch_ms)),
        }
    }

    /// Advance the fake clock by the given number of milliseconds.
    pub fn advance_ms(&self, delta: u64) {
        self.epoch_ms.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn epoch_ms(&self) -> u64 {
        self.epoch_ms.load(Ordering::SeqCst)
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances() {
        let clock = FakeClock::new(1_000);
        assert_eq!(clock.epoch_ms(), 1_000);
        clock.advance_ms(500);
        assert_eq!(clock.epoch_ms(), 1_500);
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.epoch_ms();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = clock.epoch_ms();
        assert!(b >= a);
    }
}
