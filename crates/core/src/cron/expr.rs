// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron expression parser

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Which field layout an expression uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CronDialect {
    /// `min hour dom month dow`, optional seconds field in front
    #[default]
    Standard,
    /// `sec min hour dom month dow`, optional year field at the end
    Quartz,
}

impl fmt::Display for CronDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CronDialect::Standard => write!(f, "standard"),
            CronDialect::Quartz => write!(f, "quartz"),
        }
    }
}

/// Parse-time configuration, sourced from dynamic config
#[derive(Debug, Clone, Default)]
pub struct CronParseOptions {
    pub dialect: CronDialect,
    /// Whether the `H` token is permitted at all
    pub hash_names: bool,
    /// Whether an omitted seconds field defaults to `H` instead of `0`
    pub hash_seconds_by_default: bool,
    /// Salt the hash with the field index, so different fields of the same
    /// expression resolve to different values
    pub hash_fields: bool,
    /// Identity hashed by `H`, normally the owning JobConfig's name
    pub hash_id: String,
}

impl CronParseOptions {
    pub fn with_hash_id(mut self, hash_id: impl Into<String>) -> Self {
        self.hash_id = hash_id.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronParseError {
    #[error("wrong number of fields for {dialect} expression: got {got}")]
    FieldCount { dialect: CronDialect, got: usize },
    #[error("invalid {field} field {value:?}: {reason}")]
    Field {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("hash token not allowed in {field} field {value:?}")]
    HashNotAllowed { field: &'static str, value: String },
}

/// Domain of one cron field
struct FieldSpec {
    name: &'static str,
    index: usize,
    min: u32,
    max: u32,
    names: &'static [(&'static str, u32)],
}

const MONTH_NAMES: &[(&str, u32)] = &[
    ("JAN", 1),
    ("FEB", 2),
    ("MAR", 3),
    ("APR", 4),
    ("MAY", 5),
    ("JUN", 6),
    ("JUL", 7),
    ("AUG", 8),
    ("SEP", 9),
    ("OCT", 10),
    ("NOV", 11),
    ("DEC", 12),
];

const DOW_NAMES: &[(&str, u32)] = &[
    ("SUN", 0),
    ("MON", 1),
    ("TUE", 2),
    ("WED", 3),
    ("THU", 4),
    ("FRI", 5),
    ("SAT", 6),
];

const SECONDS: FieldSpec = FieldSpec {
    name: "seconds",
    index: 0,
    min: 0,
    max: 59,
    names: &[],
};
const MINUTES: FieldSpec = FieldSpec {
    name: "minutes",
    index: 1,
    min: 0,
    max: 59,
    names: &[],
};
const HOURS: FieldSpec = FieldSpec {
    name: "hours",
    index: 2,
    min: 0,
    max: 23,
    names: &[],
};
const DAYS_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    index: 3,
    min: 1,
    max: 31,
    names: &[],
};
const MONTHS: FieldSpec = FieldSpec {
    name: "month",
    index: 4,
    min: 1,
    max: 12,
    names: MONTH_NAMES,
};
// Both 0 and 7 mean Sunday; 7 normalizes to 0 after parsing.
const DAYS_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    index: 5,
    min: 0,
    max: 7,
    names: DOW_NAMES,
};
const YEARS: FieldSpec = FieldSpec {
    name: "year",
    index: 6,
    min: 1970,
    max: 2099,
    names: &[],
};

/// One parsed field: the allowed values plus whether the field restricted
/// them at all (`*` and `?` leave a field unrestricted)
#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    values: BTreeSet<u32>,
    restricted: bool,
}

/// A parsed cron expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    seconds: Field,
    minutes: Field,
    hours: Field,
    days_of_month: Field,
    months: Field,
    days_of_week: Field,
    years: Option<Field>,
}

impl CronExpr {
    /// Parse an expression under the given options
    pub fn parse(expr: &str, opts: &CronParseOptions) -> Result<CronExpr, CronParseError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();

        let (seconds_text, rest, years_text): (String, &[&str], Option<&str>) = match opts.dialect {
            CronDialect::Standard => match fields.len() {
                5 => {
                    let implied = if opts.hash_seconds_by_default { "H" } else { "0" };
                    (implied.to_string(), &fields[..], None)
                }
                6 => (fields[0].to_string(), &fields[1..], None),
                got => {
                    return Err(CronParseError::FieldCount {
                        dialect: opts.dialect,
                        got,
                    })
                }
            },
            CronDialect::Quartz => match fields.len() {
                6 => (fields[0].to_string(), &fields[1..], None),
                7 => (fields[0].to_string(), &fields[1..6], Some(fields[6])),
                got => {
                    return Err(CronParseError::FieldCount {
                        dialect: opts.dialect,
                        got,
                    })
                }
            },
        };

        let mut expr = CronExpr {
            seconds: parse_field(&seconds_text, &SECONDS, opts)?,
            minutes: parse_field(rest[0], &MINUTES, opts)?,
            hours: parse_field(rest[1], &HOURS, opts)?,
            days_of_month: parse_field(rest[2], &DAYS_OF_MONTH, opts)?,
            months: parse_field(rest[3], &MONTHS, opts)?,
            days_of_week: parse_field(rest[4], &DAYS_OF_WEEK, opts)?,
            years: match years_text {
                Some(text) => Some(parse_field(text, &YEARS, opts)?),
                None => None,
            },
        };

        // Fold 7 (Sunday) into 0 so matching only deals with 0-6.
        if expr.days_of_week.values.remove(&7) {
            expr.days_of_week.values.insert(0);
        }

        Ok(expr)
    }

    /// Whether the expression fires at the given local instant
    pub fn matches(&self, dt: &NaiveDateTime) -> bool {
        if let Some(years) = &self.years {
            if !years.values.contains(&(dt.year() as u32)) {
                return false;
            }
        }
        self.months.values.contains(&dt.month())
            && self.day_matches(dt)
            && self.hours.values.contains(&dt.hour())
            && self.minutes.values.contains(&dt.minute())
            && self.seconds.values.contains(&dt.second())
    }

    /// The next firing strictly after the given local instant
    ///
    /// Search is bounded at four years to guard degenerate expressions such
    /// as Feb 30.
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let start = after
            .with_nanosecond(0)
            .unwrap_or(after)
            .checked_add_signed(chrono::Duration::seconds(1))?;

        let mut date = start.date();
        let limit = 4 * 366;

        for day in 0..limit {
            if self.date_matches(&date) {
                let from = if day == 0 { Some(start.time()) } else { None };
                if let Some(time) = self.next_time(from) {
                    return Some(date.and_time(time));
                }
            }
            date = date.succ_opt()?;
        }
        None
    }

    fn date_matches(&self, date: &chrono::NaiveDate) -> bool {
        if let Some(years) = &self.years {
            if !years.values.contains(&(date.year() as u32)) {
                return false;
            }
        }
        self.months.values.contains(&date.month()) && self.day_matches_date(date)
    }

    fn day_matches(&self, dt: &NaiveDateTime) -> bool {
        self.day_matches_date(&dt.date())
    }

    /// Standard cron day rule: when both day-of-month and day-of-week are
    /// restricted, a day matches if either does.
    fn day_matches_date(&self, date: &chrono::NaiveDate) -> bool {
        let dom = self
            .days_of_month
            .values
            .contains(&date.day());
        let dow = self
            .days_of_week
            .values
            .contains(&date.weekday().num_days_from_sunday());

        match (self.days_of_month.restricted, self.days_of_week.restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    /// First matching time-of-day at or after `from` (start of day if None)
    fn next_time(&self, from: Option<NaiveTime>) -> Option<NaiveTime> {
        let (from_h, from_m, from_s) = match from {
            Some(t) => (t.hour(), t.minute(), t.second()),
            None => (0, 0, 0),
        };

        for &hour in self.hours.values.range(from_h..) {
            let min_start = if hour == from_h { from_m } else { 0 };
            for &minute in self.minutes.values.range(min_start..) {
                let sec_start = if hour == from_h && minute == from_m {
                    from_s
                } else {
                    0
                };
                if let Some(&second) = self.seconds.values.range(sec_start..).next() {
                    return NaiveTime::from_hms_opt(hour, minute, second);
                }
            }
        }
        None
    }
}

fn parse_field(
    text: &str,
    spec: &FieldSpec,
    opts: &CronParseOptions,
) -> Result<Field, CronParseError> {
    if text == "*" || text == "?" {
        return Ok(Field {
            values: (spec.min..=spec.max).collect(),
            restricted: false,
        });
    }

    let err = |reason: &str| CronParseError::Field {
        field: spec.name,
        value: text.to_string(),
        reason: reason.to_string(),
    };

    let mut values = BTreeSet::new();
    for part in text.split(',') {
        if part.is_empty() {
            return Err(err("empty list entry"));
        }

        let (base, step) = match part.split_once('/') {
            Some((base, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| err("step must be a positive integer"))?;
                if step == 0 {
                    return Err(err("step must be a positive integer"));
                }
                (base, Some(step))
            }
            None => (part, None),
        };

        let (lo, hi) = match base {
            "*" => (spec.min, spec.max),
            _ => match base.split_once('-') {
                Some((a, b)) => {
                    let lo = parse_value(a, spec, opts)?;
                    let hi = parse_value(b, spec, opts)?;
                    if lo > hi {
                        return Err(err("range start exceeds range end"));
                    }
                    (lo, hi)
                }
                // A bare value with a step means "from here to the max".
                None => {
                    let value = parse_value(base, spec, opts)?;
                    match step {
                        Some(_) => (value, spec.max),
                        None => (value, value),
                    }
                }
            },
        };

        let step = step.unwrap_or(1);
        values.extend((lo..=hi).step_by(step as usize));
    }

    Ok(Field {
        values,
        restricted: true,
    })
}

fn parse_value(text: &str, spec: &FieldSpec, opts: &CronParseOptions) -> Result<u32, CronParseError> {
    if text == "H" {
        if !opts.hash_names {
            return Err(CronParseError::HashNotAllowed {
                field: spec.name,
                value: text.to_string(),
            });
        }
        return Ok(hash_value(spec, opts));
    }

    let upper = text.to_ascii_uppercase();
    if let Some(&(_, value)) = spec.names.iter().find(|(name, _)| *name == upper) {
        return Ok(value);
    }

    let value: u32 = text.parse().map_err(|_| CronParseError::Field {
        field: spec.name,
        value: text.to_string(),
        reason: "not a number".to_string(),
    })?;
    if value < spec.min || value > spec.max {
        return Err(CronParseError::Field {
            field: spec.name,
            value: text.to_string(),
            reason: format!("out of range {}-{}", spec.min, spec.max),
        });
    }
    Ok(value)
}

/// Resolve `H` to a stable value within the field's domain
///
/// With `hash_fields`, the salt carries the field index (counting from the
/// seconds field upward) so that each field of one expression lands on a
/// different value.
fn hash_value(spec: &FieldSpec, opts: &CronParseOptions) -> u32 {
    let salt = if opts.hash_fields {
        format!("{}:{}", opts.hash_id, spec.index)
    } else {
        opts.hash_id.clone()
    };

    let digest = Sha256::digest(salt.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let hash = u64::from_be_bytes(bytes);

    let count = (spec.max - spec.min + 1) as u64;
    spec.min + (hash % count) as u32
}
