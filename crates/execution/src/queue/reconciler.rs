// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job-queue admission reconciler
//!
//! Drives a Job from creation up to Starting. Admission is a single status
//! update; everything before it (startAfter gating, concurrency policy,
//! queue caps) leaves the Job untouched so that a crashed controller can
//! always pick up where it left off.

use crate::context::Context;
use chrono::{DateTime, Duration, Utc};
use furiko_core::job::{Job, JobCondition, JobPhase, JobResult};
use furiko_core::jobconfig::{ConcurrencyPolicy, JobConfig};
use furiko_core::meta::namespaced_key;
use furiko_runtime::clock::Clock;
use furiko_runtime::reconciler::{ReconcileError, ReconcileResult, Reconciler};
use tracing::info;

/// Poll interval while a Job waits behind the Enqueue concurrency limit;
/// informer events on finishing Jobs flush the queue earlier
const ENQUEUE_RETRY_SECONDS: i64 = 15;

/// Admits pending Jobs under the owning config's concurrency policy
pub struct JobQueueReconciler<C: Clock> {
    context: Context<C>,
    concurrency: usize,
}

impl<C: Clock> JobQueueReconciler<C> {
    pub fn new(context: Context<C>) -> Self {
        Self {
            context,
            concurrency: 4,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    fn reconcile_job(&self, key: &str) -> Result<ReconcileResult, ReconcileError> {
        let Some(job) = self.context.jobs.get(key) else {
            return Ok(ReconcileResult::Done);
        };
        if job.is_started() || job.is_finished() || job.metadata.is_deleting() {
            // Nothing to admit; keep the owning config's counters fresh.
            if let Some(config) = self.owning_config(&job) {
                self.sync_config_status(&config);
            }
            return Ok(ReconcileResult::Done);
        }
        let now = self.context.clock.now();

        // startAfter gates admission without touching status.
        if let Some(start_after) = job.spec.start_policy.as_ref().and_then(|p| p.start_after) {
            if start_after > now {
                return Ok(ReconcileResult::RequeueAfter(start_after - now));
            }
        }

        let config = self.owning_config(&job);
        let policy = job.effective_concurrency_policy(
            config
                .as_ref()
                .map(|c| c.spec.concurrency.policy)
                .unwrap_or_default(),
        );

        if let Some(config) = &config {
            if policy == ConcurrencyPolicy::Enqueue {
                if let Some(result) = self.check_queue_cap(&job, config, now)? {
                    return Ok(result);
                }
            }

            let namespace = &job.metadata.namespace;
            let config_uid = &config.metadata.uid;
            match policy {
                ConcurrencyPolicy::Allow => {}
                ConcurrencyPolicy::Forbid => {
                    if self.context.active_jobs.any_inflight(namespace, config_uid) {
                        info!(job = %key, "rejecting job, another job is inflight");
                        self.reject(
                            &job,
                            now,
                            "ConcurrencyConflict",
                            "Another Job for the same JobConfig is already running",
                        )?;
                        self.sync_config_status(config);
                        return Ok(ReconcileResult::Done);
                    }
                }
                ConcurrencyPolicy::Enqueue => {
                    let inflight = self.context.active_jobs.count_inflight(namespace, config_uid);
                    let max = config.spec.concurrency.max_concurrency.max(1) as usize;
                    if inflight >= max {
                        return Ok(ReconcileResult::RequeueAfter(Duration::seconds(
                            ENQUEUE_RETRY_SECONDS,
                        )));
                    }
                }
            }
        }

        self.admit(&job, now)?;
        if let Some(config) = &config {
            self.sync_config_status(config);
        }
        Ok(ReconcileResult::Done)
    }

    /// Enforce maxEnqueuedJobs: the newest jobs beyond the cap are rejected
    fn check_queue_cap(
        &self,
        job: &Job,
        config: &JobConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<ReconcileResult>, ReconcileError> {
        let max = self
            .context
            .config
            .job_configs()
            .map_err(|e| ReconcileError::Transient(e.to_string()))?
            .max_enqueued_jobs() as usize;

        let mut queued: Vec<Job> = self
            .context
            .jobs
            .list()
            .into_iter()
            .filter(|j| {
                j.metadata.namespace == job.metadata.namespace
                    && !j.is_started()
                    && !j.is_finished()
                    && !j.metadata.is_deleting()
                    && j.spec.config_ref.as_ref().map(|r| r.uid.as_str())
                        == Some(config.metadata.uid.as_str())
            })
            .collect();
        queued.sort_by_key(|j| (j.metadata.creation_timestamp, j.metadata.name.clone()));

        let position = queued
            .iter()
            .position(|j| j.metadata.uid == job.metadata.uid);
        if let Some(position) = position {
            if position >= max {
                info!(
                    job = %job.metadata.key(),
                    position,
                    max,
                    "rejecting job, enqueue cap exceeded"
                );
                self.reject(
                    job,
                    now,
                    "QueueFull",
                    "Too many Jobs are already enqueued for the JobConfig",
                )?;
                self.sync_config_status(config);
                return Ok(Some(ReconcileResult::Done));
            }
        }
        Ok(None)
    }

    /// Admission: one status update setting the start time
    fn admit(&self, job: &Job, now: DateTime<Utc>) -> Result<(), ReconcileError> {
        let mut admitted = job.clone();
        admitted.status.start_time = Some(now);
        admitted.status.phase = JobPhase::Starting;
        admitted.status.condition = JobCondition::waiting(
            "WaitingForTaskCreation",
            "Waiting for the first task to be created",
        );
        info!(job = %job.metadata.key(), start_time = %now, "admitting job");
        self.write(admitted)
    }

    /// Terminal admission failure, persisted on the Job
    fn reject(
        &self,
        job: &Job,
        now: DateTime<Utc>,
        reason: &str,
        message: &str,
    ) -> Result<(), ReconcileError> {
        let mut rejected = job.clone();
        rejected.status.phase = JobPhase::AdmissionError;
        rejected.status.condition = JobCondition::Finished {
            created_at: None,
            finished_at: now,
            result: JobResult::Failed,
            reason: reason.to_string(),
            message: message.to_string(),
        };
        self.write(rejected)
    }

    fn write(&self, job: Job) -> Result<(), ReconcileError> {
        match self.context.jobs.update(job) {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(ReconcileError::Transient(e.to_string())),
        }
    }

    fn owning_config(&self, job: &Job) -> Option<JobConfig> {
        let config_ref = job.spec.config_ref.as_ref()?;
        self.context
            .job_configs
            .get(&namespaced_key(&job.metadata.namespace, &config_ref.name))
    }

    /// Best-effort refresh of the config's queued/active counters
    fn sync_config_status(&self, config: &JobConfig) {
        let namespace = &config.metadata.namespace;
        let uid = &config.metadata.uid;
        let active = self.context.active_jobs.count_inflight(namespace, uid) as i64;
        let queued = self.context.active_jobs.count_queued(namespace, uid) as i64;

        let Some(mut current) = self.context.job_configs.get(&config.metadata.key()) else {
            return;
        };
        if current.status.active == active && current.status.queued == queued {
            return;
        }
        current.status.active = active;
        current.status.queued = queued;
        // Lost conflicts are fine: the next admission refreshes the counts.
        let _ = self.context.job_configs.update(current);
    }
}

impl<C: Clock> Reconciler for JobQueueReconciler<C> {
    fn name(&self) -> &'static str {
        "JobQueueController"
    }

    fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn reconcile(&self, key: &str) -> Result<ReconcileResult, ReconcileError> {
        self.reconcile_job(key)
    }
}
