//! Time source abstraction.
//!
//! Session expiry and last-used ordering read the clock through a trait
//! so tests can drive time deterministically.

use std::sync::atomic::{AtomicI64, Ordering};

/// Unix-seconds time source.
pub trait Clock: Send + Sync {
    /// Current unix timestamp in seconds.
    fn now_ts(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ts(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Manually driven clock for tests.
#[derive(Debug, Default)]
pub struct MockClock {
    now: AtomicI64,
}

impl MockClock {
    /// Clock frozen at `now`.
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Jumps to an absolute timestamp.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Advances by `secs`.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ts(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_moves_only_when_told() {
        let clock = MockClock::new(100);
        assert_eq!(clock.now_ts(), 100);
        clock.advance(50);
        assert_eq!(clock.now_ts(), 150);
        clock.set(10);
        assert_eq!(clock.now_ts(), 10);
    }

    #[test]
    fn system_clock_is_past_2020() {
        assert!(SystemClock.now_ts() > 1_577_836_800);
    }
}
