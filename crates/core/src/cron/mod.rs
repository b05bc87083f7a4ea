// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron expression parsing and schedule iteration
//!
//! Two dialects are supported, selected by dynamic config:
//! - **standard**: `min hour dom month dow`, optionally prefixed with a
//!   seconds field (5 or 6 fields)
//! - **quartz**: `sec min hour dom month dow`, optionally suffixed with a
//!   year field (6 or 7 fields)
//!
//! Both dialects extend the usual syntax with the hash token `H`, which
//! resolves to a stable per-config value before parsing so that a fleet of
//! configs using the same expression spreads its load across the field's
//! domain instead of firing in lockstep.

mod expr;
mod schedule;



pub use expr::{CronDialect, CronExpr, CronParseError, CronParseOptions};
pub use schedule::{Schedule, ScheduleError};
