//! Time sources for the engine.
//!
//! Every timestamp the aggregator and scheduler work with comes from a
//! [`Clock`], so tests can drive the whole engine with a [`ManualClock`].

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Shared clock handle passed to the aggregator, scheduler and probes.
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time that never goes backwards.
///
/// If the system clock steps back, `now` holds at the latest reading until
/// wall time catches up. Forward steps, including suspend, pass through.
#[derive(Debug, Default)]
pub struct SystemClock {
    latest_ms: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn observe(&self, wall: DateTime<Utc>) -> DateTime<Utc> {
        let wall_ms = wall.timestamp_millis();
        let previous = self.latest_ms.fetch_max(wall_ms, Ordering::SeqCst);
        millis_to_datetime(previous.max(wall_ms))
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        self.observe(Utc::now())
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Create a manual clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Create a manual clock at a fixed, arbitrary epoch.
    pub fn at_epoch() -> Self {
        // 2024-01-01T09:00:00Z
        Self::new(millis_to_datetime(1_704_099_600_000))
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }

    /// Move the clock forward by whole seconds.
    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        millis_to_datetime(self.millis.load(Ordering::SeqCst))
    }
}

/// Convert epoch milliseconds back to a UTC timestamp.
pub(crate) fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_epoch();
        let start = clock.now();

        clock.advance_secs(90);
        assert_eq!(clock.now() - start, Duration::seconds(90));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_system_clock_holds_through_backward_step() {
        let clock = SystemClock::new();
        let start = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();

        let ahead = start + Duration::hours(1);
        let later = start + Duration::hours(2);

        assert_eq!(clock.observe(ahead), ahead);
        // Wall clock corrected back by an hour
        assert_eq!(clock.observe(start), ahead);
        assert_eq!(clock.observe(start + Duration::minutes(30)), ahead);
        assert_eq!(clock.observe(later), later);
    }

    #[test]
    fn test_system_clock_is_non_decreasing() {
        let clock = SystemClock::new();
        let mut previous = clock.now();
        for _ in 0..1000 {
            let now = clock.now();
            assert!(now >= previous);
            previous = now;
        }
        assert!((Utc::now() - previous).num_seconds().abs() < 5);
    }

    #[test]
    fn test_millis_roundtrip() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 15).unwrap();
        assert_eq!(millis_to_datetime(now.timestamp_millis()), now);
    }
}
