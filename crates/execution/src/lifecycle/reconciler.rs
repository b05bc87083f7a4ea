// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle reconciler
//!
//! Each pass derives the Job's status from the observed tasks, performs at
//! most one task side-effect (create, soft-kill, delete or force-delete),
//! writes the status with compare-and-swap, and schedules the next pass at
//! the earliest upcoming deadline.
//!
//! The kill sequence is three-staged: soft kill (annotate + bound the
//! runtime), delete after a grace period, force-delete after a second
//! grace period measured from the observed deletion timestamp. Either of
//! the later stages can be disabled with a zero timeout, and force
//! deletion can be forbidden per template.

use super::status;
use crate::context::Context;
use crate::tasks::{
    Task, TaskExecutor, TaskPhase, TaskSpec, ANNOTATION_KILLED_FROM_PENDING_TIMEOUT,
};
use chrono::{DateTime, Duration, Utc};
use furiko_core::job::{
    Job, JobCondition, JobPhase, JobResult, TaskStatus, DELETE_DEPENDENTS_FINALIZER,
};
use furiko_core::meta::ObjectMeta;
use furiko_core::options::evaluate_options;
use furiko_runtime::clock::Clock;
use furiko_runtime::config::JobExecutionConfig;
use furiko_runtime::reconciler::{ReconcileError, ReconcileResult, Reconciler};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Drives a Job from Starting through its terminal state and cleanup
pub struct JobReconciler<C: Clock> {
    context: Context<C>,
    executor: Arc<dyn TaskExecutor>,
    concurrency: usize,
}

/// The single task side-effect chosen for this pass
enum KillAction {
    SoftKill {
        key: String,
        kill_at: DateTime<Utc>,
        from_pending_timeout: bool,
    },
    Delete {
        key: String,
        task_name: String,
    },
    ForceDelete {
        key: String,
        task_name: String,
    },
}

impl<C: Clock> JobReconciler<C> {
    pub fn new(context: Context<C>, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            context,
            executor,
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
        let now = self.context.clock.now();
        let cfg = self
            .context
            .config
            .jobs()
            .map_err(|e| ReconcileError::Transient(e.to_string()))?;

        let mut tasks = self
            .executor
            .list_for_job(&job.metadata.namespace, &job.metadata.name);
        let mut updated = status::update_task_refs(&job, &tasks, now);
        let mut next_deadline: Option<DateTime<Utc>> = None;

        // Queued jobs belong to the queue controller until admitted.
        if !job.is_started() && !job.metadata.is_deleting() {
            return Ok(ReconcileResult::Done);
        }

        // Task creation, once admitted and not killing.
        if job.is_started()
            && !job.is_finished()
            && !job.metadata.is_deleting()
            && job.kill_time().is_none()
            && updated.status.tasks.is_empty()
        {
            match self.create_first_task(&updated, now) {
                Ok(task) => {
                    updated.status.created_tasks = updated.status.created_tasks.max(1);
                    tasks = vec![task];
                    updated = status::update_task_refs(&updated, &tasks, now);
                }
                Err(CreateTaskError::InvalidOptions(message)) => {
                    info!(job = %key, %message, "job options failed evaluation");
                    updated.status.condition = JobCondition::Finished {
                        created_at: None,
                        finished_at: now,
                        result: JobResult::Failed,
                        reason: "InvalidJobOptions".to_string(),
                        message,
                    };
                    updated.status.phase = JobPhase::AdmissionError;
                    self.write(&job, updated)?;
                    return Ok(ReconcileResult::Done);
                }
                Err(CreateTaskError::Store(e)) => {
                    return Err(ReconcileError::Transient(e.to_string()));
                }
            }
        }

        // Kill orchestration: an explicit kill (or the Job's deletion)
        // covers every task; the pending timeout only kills tasks that are
        // not already marked.
        if let Some(action) = self.choose_kill_action(&updated, &tasks, &cfg, now, &mut next_deadline)
        {
            self.apply_kill_action(&mut updated, action)?;
            // Re-observe so the status write reflects the side effect.
            tasks = self
                .executor
                .list_for_job(&job.metadata.namespace, &job.metadata.name);
            updated = status::update_task_refs(&updated, &tasks, now);
            merge_deadline(&mut next_deadline, now + Duration::seconds(1));
        }

        updated = status::update_job_status_from_task_refs(&updated, now);

        // Finalizer hand-off: only release the delete-dependents finalizer
        // once every ref has a recorded deleted status and no task remains.
        if updated.metadata.is_deleting()
            && tasks.is_empty()
            && updated.metadata.has_finalizer(DELETE_DEPENDENTS_FINALIZER)
        {
            let all_recorded = updated
                .status
                .tasks
                .iter()
                .all(|r| r.deleted_status.is_some());
            if all_recorded {
                updated.metadata.remove_finalizer(DELETE_DEPENDENTS_FINALIZER);
                self.write(&job, updated)?;
                return Ok(ReconcileResult::Done);
            }
        }

        // TTL cleanup after finishing.
        if let Some(finished_at) = updated.status.condition.finished_at() {
            if !updated.metadata.is_deleting() {
                let ttl = updated.effective_ttl_seconds(cfg.default_ttl_seconds_after_finished());
                let expire_at = finished_at + Duration::seconds(ttl);
                if now >= expire_at {
                    info!(job = %key, ttl, "job TTL expired, deleting");
                    self.write(&job, updated)?;
                    self.context
                        .jobs
                        .delete(key)
                        .map_err(|e| ReconcileError::Transient(e.to_string()))?;
                    return Ok(ReconcileResult::Done);
                }
                merge_deadline(&mut next_deadline, expire_at);
            }
        }

        self.write(&job, updated)?;

        match next_deadline {
            Some(at) if at > now => Ok(ReconcileResult::RequeueAfter(at - now)),
            Some(_) => Ok(ReconcileResult::RequeueAfter(Duration::seconds(1))),
            None => Ok(ReconcileResult::Done),
        }
    }

    /// Pick the first applicable kill-ladder action across the Job's tasks
    fn choose_kill_action(
        &self,
        job: &Job,
        tasks: &[Task],
        cfg: &JobExecutionConfig,
        now: DateTime<Utc>,
        next_deadline: &mut Option<DateTime<Utc>>,
    ) -> Option<KillAction> {
        let job_kill_time = job.kill_time();
        let delete_timeout = cfg.delete_killing_tasks_timeout_seconds();
        let force_timeout = cfg.force_delete_killing_tasks_timeout_seconds();
        let forbid_force = job.spec.template.forbid_force_deletion;
        let pending_timeout = job
            .spec
            .template
            .pending_timeout_seconds
            .unwrap_or_else(|| cfg.default_pending_timeout_seconds());

        for task in tasks {
            let key = task.metadata.key();

            if task.is_terminal() {
                // Terminal tasks only need reaping when the Job goes away.
                if job.metadata.is_deleting() {
                    if !task.metadata.is_deleting() {
                        return Some(KillAction::Delete {
                            key,
                            task_name: task.metadata.name.clone(),
                        });
                    }
                    if force_timeout > 0 && !forbid_force {
                        let deleted_at = task.metadata.deletion_timestamp.unwrap_or(now);
                        let at = deleted_at + Duration::seconds(force_timeout);
                        if now >= at {
                            return Some(KillAction::ForceDelete {
                                key,
                                task_name: task.metadata.name.clone(),
                            });
                        }
                        merge_deadline(next_deadline, at);
                    }
                }
                continue;
            }

            if let Some(recorded) = task.kill_timestamp() {
                // Stage 2: delete once the grace past the kill time elapses.
                if !task.metadata.is_deleting() {
                    if delete_timeout == 0 {
                        continue;
                    }
                    let at = recorded + Duration::seconds(delete_timeout);
                    if now >= at {
                        return Some(KillAction::Delete {
                            key,
                            task_name: task.metadata.name.clone(),
                        });
                    }
                    merge_deadline(next_deadline, at);
                    continue;
                }

                // Stage 3: force-delete, measured from the observed
                // deletion timestamp.
                if force_timeout == 0 {
                    continue;
                }
                let deleted_at = task
                    .metadata
                    .deletion_timestamp
                    .unwrap_or(recorded);
                let at = deleted_at + Duration::seconds(force_timeout);
                if now >= at {
                    if forbid_force {
                        warn!(
                            task = %task.metadata.name,
                            "force deletion forbidden, staying in delete stage"
                        );
                        merge_deadline(next_deadline, now + Duration::seconds(force_timeout));
                        continue;
                    }
                    return Some(KillAction::ForceDelete {
                        key,
                        task_name: task.metadata.name.clone(),
                    });
                }
                merge_deadline(next_deadline, at);
                continue;
            }

            // Stage 1: soft kill. An explicit kill always wins over the
            // pending timeout.
            if let Some(kill_at) = job_kill_time {
                if now >= kill_at {
                    return Some(KillAction::SoftKill {
                        key,
                        kill_at,
                        from_pending_timeout: false,
                    });
                }
                merge_deadline(next_deadline, kill_at);
                continue;
            }

            if pending_timeout > 0 && task.status.phase == TaskPhase::Pending {
                let deadline = task.metadata.creation_timestamp
                    + Duration::seconds(pending_timeout);
                if now >= deadline {
                    return Some(KillAction::SoftKill {
                        key,
                        kill_at: deadline,
                        from_pending_timeout: true,
                    });
                }
                merge_deadline(next_deadline, deadline);
            }
        }
        None
    }

    fn apply_kill_action(&self, job: &mut Job, action: KillAction) -> Result<(), ReconcileError> {
        match action {
            KillAction::SoftKill {
                key,
                kill_at,
                from_pending_timeout,
            } => {
                let extra: &[(&str, &str)] = if from_pending_timeout {
                    &[(ANNOTATION_KILLED_FROM_PENDING_TIMEOUT, "1")]
                } else {
                    &[]
                };
                info!(task = %key, %kill_at, from_pending_timeout, "killing task");
                self.executor
                    .apply_kill(&key, kill_at, extra)
                    .map_err(|e| ReconcileError::Transient(e.to_string()))?;
            }
            KillAction::Delete { key, task_name } => {
                info!(task = %key, "deleting killing task");
                self.executor
                    .delete(&key)
                    .map_err(|e| ReconcileError::Transient(e.to_string()))?;
                record_deleted_status(
                    job,
                    &task_name,
                    "Deleted",
                    "Task was killed via deletion",
                );
            }
            KillAction::ForceDelete { key, task_name } => {
                warn!(task = %key, "force deleting task");
                self.executor
                    .force_delete(&key)
                    .map_err(|e| ReconcileError::Transient(e.to_string()))?;
                record_deleted_status(
                    job,
                    &task_name,
                    "ForceDeleted",
                    "Forcefully deleted the task, container may still be running",
                );
            }
        }
        Ok(())
    }

    /// Materialise options and launch task attempt 1 from the template
    fn create_first_task(&self, job: &Job, now: DateTime<Utc>) -> Result<Task, CreateTaskError> {
        let option_spec = job.spec.config_ref.as_ref().and_then(|r| {
            let config_key =
                furiko_core::meta::namespaced_key(&job.metadata.namespace, &r.name);
            self.context
                .job_configs
                .get(&config_key)
                .and_then(|c| c.spec.option_spec)
        });

        let (values, errs) = evaluate_options(
            &job.spec.option_values,
            option_spec.as_ref(),
            "spec.optionValues",
        );
        if let Some(aggregate) = errs.to_aggregate() {
            return Err(CreateTaskError::InvalidOptions(aggregate));
        }

        let template = &job.spec.template;
        let mut metadata = ObjectMeta::new(
            &job.metadata.namespace,
            format!("{}-{}", job.metadata.name, 1),
        );
        metadata.creation_timestamp = now;

        let task = Task {
            metadata,
            spec: TaskSpec {
                job_name: job.metadata.name.clone(),
                retry_index: 1,
                image: template.image.clone(),
                command: substitute_all(&template.command, &values),
                args: substitute_all(&template.args, &values),
                env: template
                    .env
                    .iter()
                    .map(|(k, v)| (k.clone(), substitute(v, &values)))
                    .collect(),
                active_deadline_seconds: None,
            },
            status: Default::default(),
        };

        match self.executor.create(task.clone()) {
            Ok(created) => Ok(created),
            Err(e) if e.is_already_exists() => {
                // A previous pass created it; the next list will observe it.
                Ok(self.executor.get(&task.metadata.key()).unwrap_or(task))
            }
            Err(e) => Err(CreateTaskError::Store(e)),
        }
    }

    /// Compare-and-swap the Job if anything changed
    fn write(&self, original: &Job, updated: Job) -> Result<(), ReconcileError> {
        if *original == updated {
            return Ok(());
        }
        match self.context.jobs.update(updated) {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(ReconcileError::Transient(e.to_string())),
        }
    }
}

enum CreateTaskError {
    InvalidOptions(String),
    Store(furiko_runtime::store::StoreError),
}

impl<C: Clock> Reconciler for JobReconciler<C> {
    fn name(&self) -> &'static str {
        "JobController"
    }

    fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn reconcile(&self, key: &str) -> Result<ReconcileResult, ReconcileError> {
        self.reconcile_job(key)
    }
}

fn record_deleted_status(job: &mut Job, task_name: &str, reason: &str, message: &str) {
    for r in &mut job.status.tasks {
        if r.name == task_name {
            // Each deletion stage records the intended final state; a later
            // stage supersedes the earlier one. Terminal tasks keep their
            // outcome through teardown.
            let status = if let Some(result) = r.status.result {
                TaskStatus::finished(result, reason, message)
            } else {
                TaskStatus::finished(JobResult::Killed, reason, message)
            };
            r.deleted_status = Some(status);
        }
    }
}

fn substitute(input: &str, values: &BTreeMap<String, String>) -> String {
    let mut out = input.to_string();
    for (key, value) in values {
        out = out.replace(&format!("${{{}}}", key), value);
    }
    out
}

fn substitute_all(inputs: &[String], values: &BTreeMap<String, String>) -> Vec<String> {
    inputs.iter().map(|s| substitute(s, values)).collect()
}

fn merge_deadline(slot: &mut Option<DateTime<Utc>>, candidate: DateTime<Utc>) {
    match slot {
        Some(existing) if *existing <= candidate => {}
        _ => *slot = Some(candidate),
    }
}
