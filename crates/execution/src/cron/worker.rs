// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron worker: one ticker across all scheduled JobConfigs
//!
//! Every second the worker advances each tracked config's cursor and
//! creates a Job per elapsed firing. Emission is idempotent across
//! controller replicas because the Job name is deterministic per
//! (config, scheduled instant): a create conflict means another replica
//! (or a previous tick) already emitted it.

use super::tracker::ScheduleTracker;
use crate::context::Context;
use chrono::{DateTime, Utc};
use furiko_core::cron::Schedule;
use furiko_core::job::{
    ConfigRef, Job, JobSpec, ANNOTATION_SCHEDULED_AT, DELETE_DEPENDENTS_FINALIZER,
};
use furiko_core::jobconfig::{ConcurrencyPolicy, JobConfig};
use furiko_core::meta::ObjectMeta;
use furiko_runtime::clock::Clock;
use furiko_runtime::config::CronExecutionConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Emits Jobs for every enabled JobConfig schedule
pub struct CronWorker<C: Clock> {
    context: Context<C>,
    trackers: Mutex<HashMap<String, ScheduleTracker>>,
}

impl<C: Clock> CronWorker<C> {
    pub fn new(context: Context<C>) -> Self {
        Self {
            context,
            trackers: Mutex::new(HashMap::new()),
        }
    }

    /// Run the one-second ticker until shutdown
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("cron worker started");
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick(),
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("cron worker stopped");
    }

    /// One pass over all configs; separated from `run` for tests
    pub fn tick(&self) {
        let now = self.context.clock.now();
        let cron_cfg = match self.context.config.cron() {
            Ok(cfg) => cfg,
            Err(e) => {
                error!(error = %e, "cannot load cron config, skipping tick");
                return;
            }
        };

        let configs = self.context.job_configs.list();
        let mut seen = Vec::with_capacity(configs.len());

        for config in configs {
            let key = config.metadata.key();
            if !config.is_scheduled() || config.metadata.is_deleting() {
                self.trackers.lock().unwrap_or_else(|e| e.into_inner()).remove(&key);
                continue;
            }
            seen.push(key.clone());
            self.tick_config(&config, &cron_cfg, now);
        }

        // Deleted configs stop being tracked.
        self.trackers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|key, _| seen.contains(key));
    }

    fn tick_config(&self, config: &JobConfig, cron_cfg: &CronExecutionConfig, now: DateTime<Utc>) {
        let key = config.metadata.key();
        let fingerprint = schedule_fingerprint(config);

        let outcome = {
            let mut trackers = self.trackers.lock().unwrap_or_else(|e| e.into_inner());
            let needs_rebuild = trackers
                .get(&key)
                .map(|t| t.fingerprint() != fingerprint)
                .unwrap_or(true);

            if needs_rebuild {
                let had_tracker = trackers.remove(&key).is_some();
                let schedule = match self.parse_schedule(config, cron_cfg) {
                    Some(s) => s,
                    None => return,
                };
                // A live edit resets the cursor to now: schedule changes
                // never retroactively emit. A fresh process resumes from
                // the persisted cursor instead.
                let cursor = if had_tracker {
                    now
                } else {
                    config.status.last_scheduled.unwrap_or(now)
                };
                trackers.insert(key.clone(), ScheduleTracker::new(schedule, fingerprint, cursor));
            }

            match trackers.get_mut(&key) {
                Some(tracker) => tracker.advance(
                    now,
                    cron_cfg.max_missed_schedules(),
                    cron_cfg.max_downtime_threshold_seconds(),
                ),
                None => return,
            }
        };

        if outcome.snapped {
            warn!(
                config = %key,
                threshold = cron_cfg.max_downtime_threshold_seconds(),
                "schedule cursor trailed too far behind, snapping forward"
            );
        }
        if outcome.dropped > 0 {
            warn!(
                config = %key,
                dropped = outcome.dropped,
                cap = cron_cfg.max_missed_schedules(),
                "dropping oldest missed schedules beyond the cap"
            );
        }

        let mut emitted = false;
        for scheduled_at in &outcome.firings {
            if self.emit(config, *scheduled_at) {
                emitted = true;
            }
        }
        if emitted || !outcome.firings.is_empty() {
            self.record_last_scheduled(config);
        }
    }

    /// Create the Job for one firing; returns whether a Job was created
    fn emit(&self, config: &JobConfig, scheduled_at: DateTime<Utc>) -> bool {
        let namespace = &config.metadata.namespace;
        let policy = config.spec.concurrency.policy;

        // Forbid skips the firing outright while anything is inflight;
        // Enqueue emits and lets admission gate the start.
        if policy == ConcurrencyPolicy::Forbid
            && self
                .context
                .active_jobs
                .any_inflight(namespace, &config.metadata.uid)
        {
            debug!(
                config = %config.metadata.key(),
                %scheduled_at,
                "skipping firing, another job is inflight"
            );
            return false;
        }

        let name = format!("{}-{}", config.metadata.name, scheduled_at.timestamp());
        let mut metadata = ObjectMeta::new(namespace, name);
        metadata.set_annotation(ANNOTATION_SCHEDULED_AT, scheduled_at.to_rfc3339());
        metadata.add_finalizer(DELETE_DEPENDENTS_FINALIZER);

        let job = Job::new(
            metadata,
            JobSpec {
                config_ref: Some(ConfigRef {
                    name: config.metadata.name.clone(),
                    uid: config.metadata.uid.clone(),
                }),
                template: config.spec.template.clone(),
                option_values: serde_json::Map::new(),
                start_policy: None,
                kill_timestamp: None,
                ttl_seconds_after_finished: None,
            },
        );

        match self.context.jobs.create(job) {
            Ok(created) => {
                info!(
                    job = %created.metadata.key(),
                    config = %config.metadata.key(),
                    %scheduled_at,
                    "created job for schedule"
                );
                true
            }
            // Another replica or an earlier tick won the race.
            Err(e) if e.is_already_exists() => false,
            Err(e) => {
                error!(
                    config = %config.metadata.key(),
                    %scheduled_at,
                    error = %e,
                    "cannot create job for schedule"
                );
                false
            }
        }
    }

    fn parse_schedule(&self, config: &JobConfig, cron_cfg: &CronExecutionConfig) -> Option<Schedule> {
        let schedule_spec = config.spec.schedule.as_ref()?;
        let timezone = schedule_spec
            .timezone
            .clone()
            .unwrap_or_else(|| cron_cfg.default_timezone());
        let opts = cron_cfg.parse_options(config.metadata.name.clone());

        match Schedule::parse(&schedule_spec.cron_expression, &timezone, &opts) {
            Ok(schedule) => Some(schedule),
            // Admission validates expressions; anything invalid that still
            // reached the store is skipped, not retried.
            Err(e) => {
                warn!(
                    config = %config.metadata.key(),
                    expression = %schedule_spec.cron_expression,
                    error = %e,
                    "cannot parse schedule, skipping config"
                );
                None
            }
        }
    }

    /// Persist the advanced cursor on the config status, best-effort
    fn record_last_scheduled(&self, config: &JobConfig) {
        let key = config.metadata.key();
        let last = {
            let trackers = self.trackers.lock().unwrap_or_else(|e| e.into_inner());
            match trackers.get(&key) {
                Some(t) => t.last_scheduled(),
                None => return,
            }
        };

        let Some(mut current) = self.context.job_configs.get(&key) else {
            return;
        };
        if current.status.last_scheduled == Some(last) {
            return;
        }
        current.status.last_scheduled = Some(last);
        // A conflict means someone else updated the config; the cursor is
        // re-persisted on the next firing.
        let _ = self.context.job_configs.update(current);
    }
}

/// Spec fields whose change resets the schedule cursor
fn schedule_fingerprint(config: &JobConfig) -> String {
    match &config.spec.schedule {
        Some(s) => format!(
            "{}|{}|{}",
            s.cron_expression,
            s.timezone.as_deref().unwrap_or(""),
            s.last_updated.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ),
        None => String::new(),
    }
}
