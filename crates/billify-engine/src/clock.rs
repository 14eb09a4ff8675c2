//! # Clock Abstraction
//!
//! Time is an input, not an ambient. Every "now" the engine uses flows
//! through the [`Clock`] trait so tests can pin or advance it, and the
//! same-day dispatch rule and scheduler windows become deterministic.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};

/// A source of the current time.
///
/// Object safe so engines and jobs can hold `Arc<dyn Clock>`.
pub trait Clock: Send + Sync {
    /// The current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// The production clock: reads the system time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A test clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a manual clock pinned to the given instant.
    pub fn new(now: DateTime<Utc>) -> Self {
        ManualClock {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Pins the clock to a new instant.
    pub fn set(&self, now: DateTime<Utc>) {
        // Lock poisoning only happens if a test thread panicked mid-set.
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard = now;
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The UTC bounds `[start, end)` of the business-local calendar day
/// containing `now`.
///
/// `utc_offset_minutes` is the business's offset from UTC (positive east).
/// The dispatch job uses this window so "invoices dated today" means today
/// where the business operates, not today in UTC.
pub fn day_bounds(now: DateTime<Utc>, utc_offset_minutes: i32) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = Duration::minutes(utc_offset_minutes as i64);
    let local_date = (now + offset).date_naive();

    let local_midnight = Utc
        .from_utc_datetime(&local_date.and_hms_opt(0, 0, 0).unwrap_or_default());
    let start = local_midnight - offset;
    (start, start + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let clock = ManualClock::new(t0);
        assert_eq!(clock.now(), t0);

        clock.advance(Duration::hours(3));
        assert_eq!(clock.now(), t0 + Duration::hours(3));

        let t1 = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        clock.set(t1);
        assert_eq!(clock.now(), t1);
    }

    #[test]
    fn test_day_bounds_utc() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 16, 30, 0).unwrap();
        let (start, end) = day_bounds(now, 0);

        assert_eq!(start, Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 1, 16, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_day_bounds_positive_offset_crosses_date_line() {
        // 23:30 UTC is already 04:30 the NEXT day at UTC+5.
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 23, 30, 0).unwrap();
        let (start, end) = day_bounds(now, 300);

        assert_eq!(start, Utc.with_ymd_and_hms(2026, 1, 15, 19, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 1, 16, 19, 0, 0).unwrap());
        assert!(start <= now && now < end);
    }

    #[test]
    fn test_day_bounds_negative_offset() {
        // 02:00 UTC is still 21:00 the PREVIOUS day at UTC-5.
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 2, 0, 0).unwrap();
        let (start, end) = day_bounds(now, -300);

        assert_eq!(start, Utc.with_ymd_and_hms(2026, 1, 14, 5, 0, 0).unwrap());
        assert!(start <= now && now < end);
    }
}
