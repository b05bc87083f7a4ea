// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed views over the dynamic config payloads
//!
//! Every field is optional in the stored payload; the accessor methods
//! apply the documented defaults so callers never see a missing value.

use furiko_core::cron::{CronDialect, CronParseOptions};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Names of the dynamic config payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigName {
    JobExecutionConfig,
    JobConfigExecutionConfig,
    CronExecutionConfig,
}

impl fmt::Display for ConfigName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfigName::JobExecutionConfig => "JobExecutionConfig",
            ConfigName::JobConfigExecutionConfig => "JobConfigExecutionConfig",
            ConfigName::CronExecutionConfig => "CronExecutionConfig",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ConfigName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JobExecutionConfig" => Ok(ConfigName::JobExecutionConfig),
            "JobConfigExecutionConfig" => Ok(ConfigName::JobConfigExecutionConfig),
            "CronExecutionConfig" => Ok(ConfigName::CronExecutionConfig),
            _ => Err(format!("unknown config name: {}", s)),
        }
    }
}

/// Knobs of the job lifecycle controller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobExecutionConfig {
    #[serde(default)]
    pub default_ttl_seconds_after_finished: Option<i64>,
    /// 0 disables the pending timeout
    #[serde(default)]
    pub default_pending_timeout_seconds: Option<i64>,
    /// Grace before a killing task is deleted (kill stage 2)
    #[serde(default)]
    pub delete_killing_tasks_timeout_seconds: Option<i64>,
    /// Grace before a deleted task is force-deleted (kill stage 3);
    /// 0 disables force deletion
    #[serde(default)]
    pub force_delete_killing_tasks_timeout_seconds: Option<i64>,
}

impl JobExecutionConfig {
    pub fn default_ttl_seconds_after_finished(&self) -> i64 {
        self.default_ttl_seconds_after_finished.unwrap_or(3600)
    }

    pub fn default_pending_timeout_seconds(&self) -> i64 {
        self.default_pending_timeout_seconds.unwrap_or(900)
    }

    pub fn delete_killing_tasks_timeout_seconds(&self) -> i64 {
        self.delete_killing_tasks_timeout_seconds.unwrap_or(30)
    }

    pub fn force_delete_killing_tasks_timeout_seconds(&self) -> i64 {
        self.force_delete_killing_tasks_timeout_seconds.unwrap_or(60)
    }

    /// The documented defaults, fully populated
    pub fn bootstrap() -> Self {
        Self {
            default_ttl_seconds_after_finished: Some(3600),
            default_pending_timeout_seconds: Some(900),
            delete_killing_tasks_timeout_seconds: Some(30),
            force_delete_killing_tasks_timeout_seconds: Some(60),
        }
    }
}

/// Knobs of the job-queue admission controller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfigExecutionConfig {
    /// Cap on unstarted Jobs per JobConfig under the Enqueue policy
    #[serde(default)]
    pub max_enqueued_jobs: Option<i64>,
}

impl JobConfigExecutionConfig {
    pub fn max_enqueued_jobs(&self) -> i64 {
        self.max_enqueued_jobs.unwrap_or(20)
    }

    pub fn bootstrap() -> Self {
        Self {
            max_enqueued_jobs: Some(20),
        }
    }
}

/// Knobs of the cron controller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronExecutionConfig {
    #[serde(default)]
    pub cron_format: Option<CronDialect>,
    /// Allow the `H` hash token in expressions
    #[serde(default)]
    pub cron_hash_names: Option<bool>,
    /// Default an omitted seconds field to `H` instead of `0`
    #[serde(default)]
    pub cron_hash_seconds_by_default: Option<bool>,
    /// Salt the `H` hash with the field index
    #[serde(default)]
    pub cron_hash_fields: Option<bool>,
    #[serde(default)]
    pub default_timezone: Option<String>,
    /// Back-schedule cap per config after downtime
    #[serde(default)]
    pub max_missed_schedules: Option<i64>,
    /// Snap-to-now threshold after downtime, in seconds
    #[serde(default)]
    pub max_downtime_threshold_seconds: Option<i64>,
}

impl CronExecutionConfig {
    pub fn cron_format(&self) -> CronDialect {
        self.cron_format.unwrap_or_default()
    }

    pub fn cron_hash_names(&self) -> bool {
        self.cron_hash_names.unwrap_or(false)
    }

    pub fn cron_hash_seconds_by_default(&self) -> bool {
        self.cron_hash_seconds_by_default.unwrap_or(false)
    }

    pub fn cron_hash_fields(&self) -> bool {
        self.cron_hash_fields.unwrap_or(false)
    }

    pub fn default_timezone(&self) -> String {
        self.default_timezone
            .clone()
            .unwrap_or_else(|| "UTC".to_string())
    }

    pub fn max_missed_schedules(&self) -> i64 {
        self.max_missed_schedules.unwrap_or(5)
    }

    pub fn max_downtime_threshold_seconds(&self) -> i64 {
        self.max_downtime_threshold_seconds.unwrap_or(300)
    }

    /// Build parse options for an expression owned by the given config name
    pub fn parse_options(&self, hash_id: impl Into<String>) -> CronParseOptions {
        CronParseOptions {
            dialect: self.cron_format(),
            hash_names: self.cron_hash_names(),
            hash_seconds_by_default: self.cron_hash_seconds_by_default(),
            hash_fields: self.cron_hash_fields(),
            hash_id: hash_id.into(),
        }
    }

    pub fn bootstrap() -> Self {
        Self {
            cron_format: Some(CronDialect::Standard),
            cron_hash_names: Some(false),
            cron_hash_seconds_by_default: Some(false),
            cron_hash_fields: Some(false),
            default_timezone: Some("UTC".to_string()),
            max_missed_schedules: Some(5),
            max_downtime_threshold_seconds: Some(300),
        }
    }
}
