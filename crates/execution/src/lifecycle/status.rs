// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure status derivation
//!
//! The Job's phase and condition are a function of its spec, the observed
//! task states and the clock; nothing here touches the store. The lifecycle
//! reconciler recomputes this on every pass, and the same functions back
//! the test fixtures so that fixture drift cannot diverge from controller
//! behavior.

use crate::tasks::Task;
use chrono::{DateTime, Utc};
use furiko_core::job::{
    Job, JobCondition, JobPhase, JobResult, TaskRef, TaskState, TaskStatus,
};

/// Reason used when a task disappears without a recorded deletion
const REASON_TASK_LOST: &str = "TaskLost";
/// Reason marking a Job whose tasks finished without a knowable result
const REASON_FINISHED_UNKNOWN: &str = "FinishedUnknown";

/// Rebuild the Job's task refs from the observed tasks
///
/// Refs for tasks that are no longer observed are finalised: a ref with a
/// recorded `deleted_status` takes that as its final status, one without is
/// marked lost.
pub fn update_task_refs(job: &Job, tasks: &[Task], now: DateTime<Utc>) -> Job {
    let mut new_job = job.clone();
    let mut refs: Vec<TaskRef> = Vec::with_capacity(tasks.len());

    for task in tasks {
        let existing = job
            .status
            .tasks
            .iter()
            .find(|r| r.name == task.metadata.name);

        let status = task.derived_status();
        let finish_timestamp = match task.status.finish_time {
            Some(t) => Some(t),
            None if status.state.is_terminal() => Some(now),
            None => None,
        };

        refs.push(TaskRef {
            name: task.metadata.name.clone(),
            retry_index: task.spec.retry_index,
            creation_timestamp: task.metadata.creation_timestamp,
            run_timestamp: task.status.start_time,
            finish_timestamp,
            status,
            deleted_status: existing.and_then(|r| r.deleted_status.clone()),
            container_states: task.status.container_states.clone(),
        });
    }

    // Refs whose task vanished from the store.
    for existing in &job.status.tasks {
        if tasks.iter().any(|t| t.metadata.name == existing.name) {
            continue;
        }
        let mut r = existing.clone();
        match &r.deleted_status {
            Some(deleted) => {
                r.status = deleted.clone();
            }
            None => {
                r.status = TaskStatus {
                    state: TaskState::Failed,
                    result: None,
                    reason: REASON_TASK_LOST.to_string(),
                    message: "Task was deleted unexpectedly".to_string(),
                };
            }
        }
        if r.finish_timestamp.is_none() {
            r.finish_timestamp = Some(now);
        }
        refs.push(r);
    }

    refs.sort_by_key(|r| (r.retry_index, r.name.clone()));
    new_job.status.created_tasks = new_job.status.created_tasks.max(refs.len() as i64);
    new_job.status.tasks = refs;
    new_job
}

/// Recompute phase and condition from the Job's task refs
///
/// A `Finished` condition is immutable: once present it is preserved
/// verbatim, along with the phase it implies.
pub fn update_job_status_from_task_refs(job: &Job, now: DateTime<Utc>) -> Job {
    let mut new_job = job.clone();

    if job.status.condition.is_finished() {
        return new_job;
    }

    if !job.is_started() {
        new_job.status.phase = JobPhase::Queued;
        if !matches!(new_job.status.condition, JobCondition::Queued { .. }) {
            new_job.status.condition = JobCondition::default();
        }
        return new_job;
    }

    let refs = &job.status.tasks;
    if refs.is_empty() {
        new_job.status.phase = JobPhase::Starting;
        new_job.status.condition = JobCondition::waiting(
            "WaitingForTaskCreation",
            "Waiting for the first task to be created",
        );
        return new_job;
    }

    if refs.iter().all(|r| r.status.state.is_terminal()) {
        let (condition, phase) = finished_condition(refs, now);
        new_job.status.condition = condition;
        new_job.status.phase = phase;
        return new_job;
    }

    if let Some(running) = refs.iter().find(|r| r.status.state == TaskState::Running) {
        let started_at = running
            .run_timestamp
            .or(job.status.start_time)
            .unwrap_or(now);
        new_job.status.condition = JobCondition::Running { started_at };
        new_job.status.phase = JobPhase::Running;
        return new_job;
    }

    // Staging or killing tasks: surface the first task's reason.
    let waiting = refs
        .iter()
        .find(|r| !r.status.state.is_terminal())
        .map(|r| (r.status.reason.clone(), r.status.message.clone()))
        .unwrap_or_default();
    new_job.status.condition = JobCondition::waiting(waiting.0, waiting.1);
    new_job.status.phase = JobPhase::Pending;
    new_job
}

fn finished_condition(refs: &[TaskRef], now: DateTime<Utc>) -> (JobCondition, JobPhase) {
    let created_at = refs.iter().map(|r| r.creation_timestamp).min();
    let finished_at = refs
        .iter()
        .filter_map(|r| r.finish_timestamp)
        .max()
        .unwrap_or(now);

    let unknown = refs.iter().any(|r| r.status.result.is_none());
    if unknown {
        let condition = JobCondition::Finished {
            created_at,
            finished_at,
            result: JobResult::Failed,
            reason: REASON_FINISHED_UNKNOWN.to_string(),
            message: "One or more tasks finished without a result".to_string(),
        };
        return (condition, JobPhase::FinishedUnknown);
    }

    // Worst outcome wins across task attempts.
    let worst = refs
        .iter()
        .filter_map(|r| r.status.result)
        .max()
        .unwrap_or(JobResult::Succeeded);
    let source = refs
        .iter()
        .filter(|r| r.status.result == Some(worst))
        .next_back();

    let (reason, message) = source
        .map(|r| (r.status.reason.clone(), r.status.message.clone()))
        .unwrap_or_default();

    let condition = JobCondition::Finished {
        created_at,
        finished_at,
        result: worst,
        reason,
        message,
    };
    (condition, worst.phase())
}
