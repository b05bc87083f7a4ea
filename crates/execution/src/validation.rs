// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission validation entry points
//!
//! These back the (externally hosted) validating webhook: option spec
//! shape, schedule parseability, and immutability of a finished Job
//! condition. Everything returns aggregated field errors so a single
//! admission response can report every problem at once.

use furiko_core::cron::Schedule;
use furiko_core::job::Job;
use furiko_core::jobconfig::JobConfig;
use furiko_core::options::{evaluate_options, validate_option_spec};
use furiko_core::validation::{ErrorList, FieldError};
use furiko_runtime::config::CronExecutionConfig;

#[cfg(test)]
#[path = "validation_tests.rs"]
mod validation_tests;

/// Validate a JobConfig spec at admission
pub fn validate_job_config(config: &JobConfig, cron_cfg: &CronExecutionConfig) -> ErrorList {
    let mut errs = ErrorList::new();

    if let Some(option_spec) = &config.spec.option_spec {
        errs.extend(validate_option_spec(option_spec, "spec.optionSpec"));
    }

    if config.spec.concurrency.max_concurrency < 1 {
        errs.push(FieldError::invalid(
            "spec.concurrency.maxConcurrency",
            config.spec.concurrency.max_concurrency,
            "must be at least 1",
        ));
    }

    if let Some(schedule) = &config.spec.schedule {
        let timezone = schedule
            .timezone
            .clone()
            .unwrap_or_else(|| cron_cfg.default_timezone());
        let opts = cron_cfg.parse_options(config.metadata.name.clone());
        if let Err(e) = Schedule::parse(&schedule.cron_expression, &timezone, &opts) {
            errs.push(FieldError::invalid(
                "spec.schedule.cronExpression",
                &schedule.cron_expression,
                &e.to_string(),
            ));
        }
    }

    errs
}

/// Validate a Job's option values against the owning config's spec
pub fn validate_job(job: &Job, config: Option<&JobConfig>) -> ErrorList {
    let option_spec = config.and_then(|c| c.spec.option_spec.as_ref());
    let (_, errs) = evaluate_options(&job.spec.option_values, option_spec, "spec.optionValues");
    errs
}

/// Reject mutations of a finished Job's terminal condition
pub fn validate_job_update(old: &Job, new: &Job) -> ErrorList {
    let mut errs = ErrorList::new();
    if old.is_finished() && new.status.condition != old.status.condition {
        errs.push(FieldError::new(
            "status.condition",
            "finished condition is immutable",
        ));
    }
    errs
}
