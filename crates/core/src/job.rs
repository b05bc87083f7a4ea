// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job object model
//!
//! A Job is one concrete execution derived from a JobConfig (or created
//! ad-hoc). Its status is owned by the controllers: the phase and condition
//! are derived from the observed task states on every reconcile and never
//! persisted independently of that derivation.

use crate::jobconfig::{ConcurrencyPolicy, TaskTemplate};
use crate::meta::ObjectMeta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Finalizer held by a Job until all of its tasks are reaped
pub const DELETE_DEPENDENTS_FINALIZER: &str = "execution.furiko.io/delete-dependents";

/// Annotation stamping the schedule instant a Job was created for
pub const ANNOTATION_SCHEDULED_AT: &str = "execution.furiko.io/scheduled-at";

/// One concrete execution of a JobConfig
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub metadata: ObjectMeta,
    pub spec: JobSpec,
    #[serde(default)]
    pub status: JobStatus,
}

/// Reference from a Job back to its owning JobConfig
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRef {
    pub name: String,
    pub uid: String,
}

/// Override of when and how a Job may be admitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartPolicy {
    /// Overrides the owning JobConfig's concurrency policy when set
    #[serde(default)]
    pub concurrency_policy: Option<ConcurrencyPolicy>,
    /// Earliest instant the Job may be admitted
    #[serde(default)]
    pub start_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Owning JobConfig, None for ad-hoc Jobs
    #[serde(default)]
    pub config_ref: Option<ConfigRef>,
    /// Task template snapshotted from the config at creation time
    pub template: TaskTemplate,
    /// Raw option values, validated against the owner's OptionSpec
    #[serde(default)]
    pub option_values: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub start_policy: Option<StartPolicy>,
    /// Requests all tasks be killed at this instant
    #[serde(default)]
    pub kill_timestamp: Option<DateTime<Utc>>,
    /// Seconds to retain the Job after it finishes; 0 deletes immediately
    #[serde(default)]
    pub ttl_seconds_after_finished: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub phase: JobPhase,
    #[serde(default)]
    pub condition: JobCondition,
    /// Set exactly once, at admission
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_tasks: i64,
    #[serde(default)]
    pub tasks: Vec<TaskRef>,
}

/// Phase of a Job, derived from its condition and task refs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobPhase {
    #[default]
    Queued,
    Starting,
    Pending,
    Running,
    Succeeded,
    Failed,
    Killed,
    AdmissionError,
    FinishedUnknown,
}

impl JobPhase {
    /// Whether this phase is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobPhase::Succeeded
                | JobPhase::Failed
                | JobPhase::Killed
                | JobPhase::AdmissionError
                | JobPhase::FinishedUnknown
        )
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobPhase::Queued => "Queued",
            JobPhase::Starting => "Starting",
            JobPhase::Pending => "Pending",
            JobPhase::Running => "Running",
            JobPhase::Succeeded => "Succeeded",
            JobPhase::Failed => "Failed",
            JobPhase::Killed => "Killed",
            JobPhase::AdmissionError => "AdmissionError",
            JobPhase::FinishedUnknown => "FinishedUnknown",
        };
        write!(f, "{}", s)
    }
}

/// Condition of a Job: exactly one variant holds at any time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum JobCondition {
    /// Not yet admitted by the queue controller
    Queued {
        #[serde(default)]
        reason: String,
        #[serde(default)]
        message: String,
    },
    /// Admitted, waiting for tasks to start running
    Waiting {
        #[serde(default)]
        reason: String,
        #[serde(default)]
        message: String,
    },
    /// At least one task is running
    Running { started_at: DateTime<Utc> },
    /// All tasks have reached a terminal state; immutable once set
    Finished {
        created_at: Option<DateTime<Utc>>,
        finished_at: DateTime<Utc>,
        result: JobResult,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        message: String,
    },
}

impl Default for JobCondition {
    fn default() -> Self {
        JobCondition::Queued {
            reason: String::new(),
            message: String::new(),
        }
    }
}

impl JobCondition {
    pub fn queued(reason: impl Into<String>, message: impl Into<String>) -> Self {
        JobCondition::Queued {
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn waiting(reason: impl Into<String>, message: impl Into<String>) -> Self {
        JobCondition::Waiting {
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobCondition::Finished { .. })
    }

    /// The terminal result, if the Job has finished
    pub fn finished_result(&self) -> Option<JobResult> {
        match self {
            JobCondition::Finished { result, .. } => Some(*result),
            _ => None,
        }
    }

    /// The finish instant, if the Job has finished
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        match self {
            JobCondition::Finished { finished_at, .. } => Some(*finished_at),
            _ => None,
        }
    }
}

/// Terminal result of a Job or task
///
/// Ordered from best to worst so that combining task outcomes takes the
/// maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JobResult {
    Succeeded,
    Failed,
    Killed,
}

impl JobResult {
    /// The phase corresponding to this result
    pub fn phase(&self) -> JobPhase {
        match self {
            JobResult::Succeeded => JobPhase::Succeeded,
            JobResult::Failed => JobPhase::Failed,
            JobResult::Killed => JobPhase::Killed,
        }
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobResult::Succeeded => "Succeeded",
            JobResult::Failed => "Failed",
            JobResult::Killed => "Killed",
        };
        write!(f, "{}", s)
    }
}

/// Record of one launched task attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRef {
    pub name: String,
    pub retry_index: i64,
    pub creation_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub run_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finish_timestamp: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    /// Intended final status while the task is being torn down; survives the
    /// task object disappearing from the store
    #[serde(default)]
    pub deleted_status: Option<TaskStatus>,
    #[serde(default)]
    pub container_states: Vec<ContainerState>,
}

/// Live status of a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub state: TaskState,
    #[serde(default)]
    pub result: Option<JobResult>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

impl TaskStatus {
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            ..Default::default()
        }
    }

    pub fn finished(result: JobResult, reason: impl Into<String>, message: impl Into<String>) -> Self {
        let state = match result {
            JobResult::Succeeded => TaskState::Succeeded,
            JobResult::Failed => TaskState::Failed,
            JobResult::Killed => TaskState::Killed,
        };
        Self {
            state,
            result: Some(result),
            reason: reason.into(),
            message: message.into(),
        }
    }
}

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Created but not yet running
    #[default]
    Staging,
    Running,
    /// A kill has been requested and is in progress
    Killing,
    Succeeded,
    Failed,
    Killed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Killed
        )
    }
}

/// Snapshot of a container's state inside a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ContainerState {
    Waiting {
        #[serde(default)]
        reason: String,
        #[serde(default)]
        message: String,
    },
    Running { started_at: DateTime<Utc> },
    Terminated {
        exit_code: i32,
        started_at: Option<DateTime<Utc>>,
        finished_at: DateTime<Utc>,
    },
}

impl Job {
    /// Create an unadmitted Job
    pub fn new(metadata: ObjectMeta, spec: JobSpec) -> Self {
        Self {
            metadata,
            spec,
            status: JobStatus::default(),
        }
    }

    /// Whether the Job has been admitted
    pub fn is_started(&self) -> bool {
        self.status.start_time.is_some()
    }

    /// Whether the Job has recorded a terminal condition
    pub fn is_finished(&self) -> bool {
        self.status.condition.is_finished()
    }

    /// The concurrency policy in effect: the Job's own override, else the
    /// given fallback from the owning config
    pub fn effective_concurrency_policy(&self, fallback: ConcurrencyPolicy) -> ConcurrencyPolicy {
        self.spec
            .start_policy
            .as_ref()
            .and_then(|p| p.concurrency_policy)
            .unwrap_or(fallback)
    }

    /// The instant all tasks should be killed at, if any: an explicit kill
    /// timestamp, else the deletion timestamp stamped by the store
    pub fn kill_time(&self) -> Option<DateTime<Utc>> {
        self.spec
            .kill_timestamp
            .or(self.metadata.deletion_timestamp)
    }

    /// TTL after finishing, falling back to the given default
    pub fn effective_ttl_seconds(&self, default: i64) -> i64 {
        self.spec.ttl_seconds_after_finished.unwrap_or(default)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
