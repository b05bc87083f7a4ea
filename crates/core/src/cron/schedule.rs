// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timezone-aware schedule iteration over a parsed expression

use super::expr::{CronExpr, CronParseError, CronParseOptions};
use chrono::{DateTime, LocalResult, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid timezone {0:?}")]
    Timezone(String),
    #[error(transparent)]
    Parse(#[from] CronParseError),
}

/// A parsed cron expression bound to a timezone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    expr: CronExpr,
    timezone: Tz,
}

impl Schedule {
    pub fn new(expr: CronExpr, timezone: Tz) -> Self {
        Self { expr, timezone }
    }

    /// Parse an expression and timezone name together
    pub fn parse(
        expression: &str,
        timezone: &str,
        opts: &CronParseOptions,
    ) -> Result<Schedule, ScheduleError> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| ScheduleError::Timezone(timezone.to_string()))?;
        let expr = CronExpr::parse(expression, opts)?;
        Ok(Schedule::new(expr, tz))
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// The next firing instant strictly after `after`
    ///
    /// Iteration happens in local time. An instant falling into a DST gap is
    /// skipped; an ambiguous instant (clocks rolled back) takes the earlier
    /// occurrence.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut local = after.with_timezone(&self.timezone).naive_local();

        for _ in 0..4 {
            let next = self.expr.next_after(local)?;
            match self.timezone.from_local_datetime(&next) {
                LocalResult::Single(dt) => return Some(dt.with_timezone(&Utc)),
                LocalResult::Ambiguous(earlier, _) => return Some(earlier.with_timezone(&Utc)),
                LocalResult::None => {
                    // DST gap: the local instant does not exist, move past it.
                    local = next;
                }
            }
        }
        None
    }
}
