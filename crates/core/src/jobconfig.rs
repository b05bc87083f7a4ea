// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JobConfig object model
//!
//! A JobConfig is a user-authored template plus scheduling policy. Its spec
//! is read-only to the controllers; the status side carries the counts and
//! the last-scheduled cursor the controllers maintain.

use crate::meta::ObjectMeta;
use crate::options::OptionSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Template plus scheduling policy for producing Jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub metadata: ObjectMeta,
    pub spec: JobConfigSpec,
    #[serde(default)]
    pub status: JobConfigStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfigSpec {
    pub template: TaskTemplate,
    #[serde(default)]
    pub option_spec: Option<OptionSpec>,
    #[serde(default)]
    pub schedule: Option<ScheduleSpec>,
    #[serde(default)]
    pub concurrency: ConcurrencySpec,
}

/// Counts and cursors maintained by the controllers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobConfigStatus {
    /// Jobs admitted and not yet finished
    #[serde(default)]
    pub active: i64,
    /// Jobs created but not yet admitted
    #[serde(default)]
    pub queued: i64,
    #[serde(default)]
    pub last_scheduled: Option<DateTime<Utc>>,
}

/// Simplified container template for a task
///
/// Values of `command`, `args` and `env` may contain `${option.<name>}`
/// placeholders, substituted at task creation from the evaluated options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Seconds a task may stay pending before it is killed; 0 disables,
    /// None falls back to the dynamic config default
    #[serde(default)]
    pub pending_timeout_seconds: Option<i64>,
    /// Never force-delete tasks of this template
    #[serde(default)]
    pub forbid_force_deletion: bool,
}

impl TaskTemplate {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            command: Vec::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            pending_timeout_seconds: None,
            forbid_force_deletion: false,
        }
    }

    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Cron schedule attached to a JobConfig
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub cron_expression: String,
    /// IANA timezone name; falls back to the dynamic config default
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    /// Bumped by the user on edits; schedule changes reset the cron cursor
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl ScheduleSpec {
    pub fn new(cron_expression: impl Into<String>) -> Self {
        Self {
            cron_expression: cron_expression.into(),
            timezone: None,
            disabled: false,
            last_updated: None,
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// How many Jobs of one JobConfig may run at once, and what to do when the
/// limit is hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencySpec {
    #[serde(default)]
    pub policy: ConcurrencyPolicy,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: i64,
}

fn default_max_concurrency() -> i64 {
    1
}

impl Default for ConcurrencySpec {
    fn default() -> Self {
        Self {
            policy: ConcurrencyPolicy::default(),
            max_concurrency: 1,
        }
    }
}

/// Policy governing simultaneous Jobs per JobConfig
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcurrencyPolicy {
    /// Always start new Jobs
    #[default]
    Allow,
    /// Reject new Jobs while any Job is inflight
    Forbid,
    /// Hold new Jobs until inflight count drops below the limit
    Enqueue,
}

impl fmt::Display for ConcurrencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConcurrencyPolicy::Allow => "Allow",
            ConcurrencyPolicy::Forbid => "Forbid",
            ConcurrencyPolicy::Enqueue => "Enqueue",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ConcurrencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Allow" => Ok(ConcurrencyPolicy::Allow),
            "Forbid" => Ok(ConcurrencyPolicy::Forbid),
            "Enqueue" => Ok(ConcurrencyPolicy::Enqueue),
            _ => Err(format!("unknown concurrency policy: {}", s)),
        }
    }
}

impl JobConfig {
    pub fn new(metadata: ObjectMeta, spec: JobConfigSpec) -> Self {
        Self {
            metadata,
            spec,
            status: JobConfigStatus::default(),
        }
    }

    /// Whether this config has an enabled schedule
    pub fn is_scheduled(&self) -> bool {
        self.spec
            .schedule
            .as_ref()
            .map(|s| !s.disabled)
            .unwrap_or(false)
    }
}
