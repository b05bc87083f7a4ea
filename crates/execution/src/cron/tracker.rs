// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-config schedule tracking with bounded back-scheduling
//!
//! The tracker keeps a cursor at the last scheduled instant and advances
//! it through every elapsed firing. Recovery after downtime is bounded
//! twice: the cursor never trails `now` by more than the downtime
//! threshold, and at most `max_missed` firings are emitted per advance,
//! dropping the oldest excess.

use chrono::{DateTime, Duration, Utc};
use furiko_core::cron::Schedule;

/// Result of advancing the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceOutcome {
    /// Elapsed firings to emit, oldest first
    pub firings: Vec<DateTime<Utc>>,
    /// Firings dropped by the back-schedule cap
    pub dropped: usize,
    /// Whether the cursor was snapped forward past a downtime gap
    pub snapped: bool,
}

/// Tracks one JobConfig's schedule cursor
pub struct ScheduleTracker {
    schedule: Schedule,
    /// Detects spec edits: schedule changes reset the cursor to now
    fingerprint: String,
    last_scheduled: DateTime<Utc>,
}

impl ScheduleTracker {
    /// Start tracking from the given cursor (the config's persisted
    /// last-scheduled time, or now for a fresh config)
    pub fn new(schedule: Schedule, fingerprint: String, cursor: DateTime<Utc>) -> Self {
        Self {
            schedule,
            fingerprint,
            last_scheduled: cursor,
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn last_scheduled(&self) -> DateTime<Utc> {
        self.last_scheduled
    }

    /// Advance the cursor through every firing in `(last_scheduled, now]`
    pub fn advance(&mut self, now: DateTime<Utc>, max_missed: i64, max_downtime: i64) -> AdvanceOutcome {
        let mut snapped = false;

        // Bound recovery after downtime: pretend the gap never happened
        // beyond the threshold.
        if max_downtime > 0 && now - self.last_scheduled > Duration::seconds(max_downtime) {
            self.last_scheduled = now - Duration::seconds(max_downtime);
            snapped = true;
        }

        let mut firings = Vec::new();
        let mut cursor = self.last_scheduled;
        while let Some(next) = self.schedule.next_after(cursor) {
            if next > now {
                break;
            }
            firings.push(next);
            cursor = next;
        }
        self.last_scheduled = cursor;

        let mut dropped = 0;
        if max_missed > 0 && firings.len() > max_missed as usize {
            dropped = firings.len() - max_missed as usize;
            firings.drain(..dropped);
        }

        AdvanceOutcome {
            firings,
            dropped,
            snapped,
        }
    }
}
