// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling
//!
//! Everything time-dependent takes a `Clock` so tests can drive schedules,
//! timeouts and TTLs deterministically. Wall-clock time is used (rather
//! than a monotonic instant) because cron math needs calendar time.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// A clock that provides the current time
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Parse an RFC3339 timestamp as the starting time
    ///
    /// Panics on invalid input; intended for test fixtures only.
    pub fn at(rfc3339: &str) -> Self {
        let start = DateTime::parse_from_rfc3339(rfc3339)
            .unwrap_or_else(|e| panic!("invalid fixture time {:?}: {}", rfc3339, e))
            .with_timezone(&Utc);
        Self::new(start)
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += duration;
    }

    /// Set the clock to a specific instant
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = instant;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_starts_at_given_time() {
        let clock = FakeClock::at("2021-02-09T04:06:05Z");
        assert_eq!(clock.now().to_rfc3339(), "2021-02-09T04:06:05+00:00");
    }

    #[test]
    fn fake_clock_advances() {
        let clock = FakeClock::at("2021-02-09T04:06:05Z");
        clock.advance(Duration::seconds(55));
        assert_eq!(clock.now().to_rfc3339(), "2021-02-09T04:07:00+00:00");
    }

    #[test]
    fn fake_clock_clones_share_time() {
        let clock = FakeClock::at("2021-02-09T04:06:05Z");
        let clone = clock.clone();
        clock.advance(Duration::minutes(1));
        assert_eq!(clone.now(), clock.now());
    }

    #[test]
    fn fake_clock_set_overrides() {
        let clock = FakeClock::at("2021-02-09T04:06:05Z");
        let target = DateTime::parse_from_rfc3339("2021-02-09T05:06:00Z")
            .unwrap()
            .with_timezone(&Utc);
        clock.set(target);
        assert_eq!(clock.now(), target);
    }
}
