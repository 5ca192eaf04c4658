//! Monotonic write clock for ordering keys.
//!
//! Links are listed most-recently-updated first, and the batch re-parenting
//! operations rely on "the last row written sorts first". Wall-clock
//! timestamps can tie or step backwards, so every write takes its stamp from
//! here instead: microseconds since the epoch, strictly increasing per process.

use std::sync::atomic::{AtomicI64, Ordering};

/// Strictly increasing microsecond clock.
#[derive(Debug, Default)]
pub struct Clock {
    last: AtomicI64,
}

impl Clock {
    /// Start a clock that never issues a stamp at or below `high_water`.
    pub fn resume(high_water: i64) -> Self {
        Self {
            last: AtomicI64::new(high_water),
        }
    }

    /// Issue the next stamp.
    pub fn tick(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_micros();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}
