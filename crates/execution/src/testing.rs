// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for controller tests

use crate::context::Context;
use chrono::{DateTime, Utc};
use furiko_core::job::{ConfigRef, Job, JobSpec, DELETE_DEPENDENTS_FINALIZER};
use furiko_core::jobconfig::{
    ConcurrencyPolicy, ConcurrencySpec, JobConfig, JobConfigSpec, ScheduleSpec, TaskTemplate,
};
use furiko_core::meta::ObjectMeta;
use furiko_runtime::clock::FakeClock;

pub const NAMESPACE: &str = "test";

pub fn at(s: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(t) => t.with_timezone(&Utc),
        Err(e) => panic!("invalid fixture time {:?}: {}", s, e),
    }
}

pub fn make_template() -> TaskTemplate {
    TaskTemplate::new("hello-world").with_args(vec!["echo".to_string(), "Hello world!".to_string()])
}

pub fn make_config(name: &str, policy: ConcurrencyPolicy, max_concurrency: i64) -> JobConfig {
    JobConfig::new(
        ObjectMeta::new(NAMESPACE, name),
        JobConfigSpec {
            template: make_template(),
            option_spec: None,
            schedule: None,
            concurrency: ConcurrencySpec {
                policy,
                max_concurrency,
            },
        },
    )
}

pub fn make_scheduled_config(name: &str, expression: &str, policy: ConcurrencyPolicy) -> JobConfig {
    let mut config = make_config(name, policy, 1);
    config.spec.schedule = Some(ScheduleSpec::new(expression));
    config
}

pub fn make_job(name: &str, config: Option<&JobConfig>) -> Job {
    let mut metadata = ObjectMeta::new(NAMESPACE, name);
    metadata.add_finalizer(DELETE_DEPENDENTS_FINALIZER);
    Job::new(
        metadata,
        JobSpec {
            config_ref: config.map(|c| ConfigRef {
                name: c.metadata.name.clone(),
                uid: c.metadata.uid.clone(),
            }),
            template: make_template(),
            option_values: serde_json::Map::new(),
            start_policy: None,
            kill_timestamp: None,
            ttl_seconds_after_finished: None,
        },
    )
}

/// Observe every current Job into the active-job index, replacing informer
/// delivery in synchronous tests
pub fn sync_active_jobs(context: &Context<FakeClock>) {
    for job in context.jobs.list() {
        context.active_jobs.observe(&job);
    }
}
