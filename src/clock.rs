//! Clock sources: a monotonic millisecond counter for elapsed-time math and
//! a settable wall clock for message timestamps.

use std::time::Instant;

use chrono::{TimeZone, Utc};

/// Monotonic millisecond clock anchored at construction.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds since this clock was created.
    pub fn millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall clock in epoch seconds, adjustable by the operator or by a peer's
/// `clock sync` request. The clock never moves backwards.
#[derive(Debug, Clone, Default)]
pub struct WallClock {
    offset_secs: i64,
}

impl WallClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time in epoch seconds.
    pub fn now_secs(&self) -> u32 {
        let now = Utc::now().timestamp() + self.offset_secs;
        now.max(0) as u32
    }

    /// Advance the clock to `timestamp`. Returns false (and leaves the clock
    /// untouched) when the target is not ahead of the current time.
    pub fn advance_to(&mut self, timestamp: u32) -> bool {
        let curr = self.now_secs();
        if timestamp > curr {
            self.offset_secs += i64::from(timestamp) - i64::from(curr);
            true
        } else {
            false
        }
    }

    /// Render the current time as `HH:MM - D/M/YYYY UTC`.
    pub fn display(&self) -> String {
        match Utc.timestamp_opt(i64::from(self.now_secs()), 0) {
            chrono::LocalResult::Single(dt) => {
                dt.format("%H:%M - %-d/%-m/%Y UTC").to_string()
            }
            _ => "(invalid time)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_never_rewinds() {
        let mut clock = WallClock::new();
        let now = clock.now_secs();
        assert!(!clock.advance_to(now.saturating_sub(100)));
        assert_eq!(clock.now_secs(), now);
        assert!(clock.advance_to(now + 1000));
        assert!(clock.now_secs() >= now + 1000);
    }

    #[test]
    fn monotonic_is_nondecreasing() {
        let clock = MonotonicClock::new();
        let a = clock.millis();
        let b = clock.millis();
        assert!(b >= a);
    }
}
