// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::testing::at;
use chrono::Duration;
use furiko_core::cron::{CronParseOptions, Schedule};

fn every_minute() -> Schedule {
    Schedule::parse("*/1 * * * *", "UTC", &CronParseOptions::default()).unwrap()
}

fn make_tracker(cursor: &str) -> ScheduleTracker {
    ScheduleTracker::new(every_minute(), "*/1 * * * *||".to_string(), at(cursor))
}

#[test]
fn no_firings_before_next_schedule() {
    let mut tracker = make_tracker("2021-02-09T04:06:00Z");
    let outcome = tracker.advance(at("2021-02-09T04:06:30Z"), 5, 300);
    assert!(outcome.firings.is_empty());
    assert_eq!(outcome.dropped, 0);
    assert!(!outcome.snapped);
}

#[test]
fn single_elapsed_firing_advances_cursor() {
    let mut tracker = make_tracker("2021-02-09T04:06:00Z");
    let outcome = tracker.advance(at("2021-02-09T04:07:00Z"), 5, 300);
    assert_eq!(outcome.firings, vec![at("2021-02-09T04:07:00Z")]);
    assert_eq!(tracker.last_scheduled(), at("2021-02-09T04:07:00Z"));
}

#[test]
fn multiple_elapsed_firings_come_oldest_first() {
    let mut tracker = make_tracker("2021-02-09T04:06:00Z");
    let outcome = tracker.advance(at("2021-02-09T04:09:00Z"), 5, 300);
    assert_eq!(
        outcome.firings,
        vec![
            at("2021-02-09T04:07:00Z"),
            at("2021-02-09T04:08:00Z"),
            at("2021-02-09T04:09:00Z"),
        ]
    );
}

#[test]
fn back_schedule_caps_missed_firings() {
    // Cursor 10 minutes behind, downtime threshold 5 minutes, cap 5: the
    // cursor snaps to now-5m and exactly 5 firings in (now-5m, now] emit.
    let now = at("2021-02-09T04:16:00Z");
    let mut tracker = make_tracker("2021-02-09T04:06:00Z");
    let outcome = tracker.advance(now, 5, 300);

    assert!(outcome.snapped);
    assert_eq!(outcome.firings.len(), 5);
    for firing in &outcome.firings {
        assert!(*firing > now - Duration::seconds(300));
        assert!(*firing <= now);
    }
    assert_eq!(*outcome.firings.last().unwrap(), now);
    assert_eq!(tracker.last_scheduled(), now);
}

#[test]
fn cap_drops_oldest_excess() {
    let mut tracker = make_tracker("2021-02-09T04:06:00Z");
    // 4 elapsed firings, cap 2: the 2 newest survive.
    let outcome = tracker.advance(at("2021-02-09T04:10:00Z"), 2, 3600);
    assert_eq!(outcome.dropped, 2);
    assert_eq!(
        outcome.firings,
        vec![at("2021-02-09T04:09:00Z"), at("2021-02-09T04:10:00Z")]
    );
}

#[test]
fn advance_is_idempotent_at_same_instant() {
    let mut tracker = make_tracker("2021-02-09T04:06:00Z");
    let now = at("2021-02-09T04:08:00Z");
    assert_eq!(tracker.advance(now, 5, 300).firings.len(), 2);
    assert!(tracker.advance(now, 5, 300).firings.is_empty());
}
