//! Wall-clock sources.
//!
//! Cache validity, execution timing, and alert bookkeeping all read time
//! through a [`Clock`] so tests can pin and advance it.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, PoisonError};

/// Source of the current wall-clock time
pub trait Clock: Send + Sync {
    /// Current time in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock
///
/// Time only moves when [`ManualClock::set`] or [`ManualClock::advance`]
/// is called.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    /// Move forward by whole minutes
    pub fn advance_minutes(&self, minutes: i64) {
        self.advance(Duration::minutes(minutes));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Milliseconds elapsed between two instants, clamped at zero
#[must_use]
pub fn elapsed_millis(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_manual_clock_is_frozen() {
        let clock = ManualClock::new(epoch());
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), epoch());
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(epoch());
        clock.advance_minutes(5);
        assert_eq!(clock.now(), epoch() + Duration::minutes(5));

        clock.advance(Duration::seconds(30));
        assert_eq!(clock.now(), epoch() + Duration::seconds(330));
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::new(epoch());
        let later = epoch() + Duration::days(1);
        clock.set(later);
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn test_elapsed_millis() {
        let start = epoch();
        assert_eq!(elapsed_millis(start, start + Duration::milliseconds(1500)), 1500);
        // Clock skew never yields a negative duration
        assert_eq!(elapsed_millis(start + Duration::seconds(1), start), 0);
    }
}
