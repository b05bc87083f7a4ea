// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task objects and the executor seam
//!
//! A Task is one runtime attempt (pod analog) launched for a Job. The
//! controllers only talk to tasks through the [`TaskExecutor`] trait; the
//! store-backed implementation here doubles as the in-process fake for
//! tests. Tasks carry a reaper finalizer so that a graceful delete leaves
//! the object observable (with a deletion timestamp) until the runtime
//! reaps it or the controller force-deletes it.

mod executor;


pub use executor::{StoreTaskExecutor, TaskExecutor};

use chrono::{DateTime, Utc};
use furiko_core::job::{ContainerState, JobResult, TaskState, TaskStatus};
use furiko_core::meta::ObjectMeta;
use furiko_runtime::store::StoreObject;
use serde::{Deserialize, Serialize};

/// Annotation carrying the instant a task was asked to terminate at
pub const ANNOTATION_KILL_TIMESTAMP: &str = "execution.furiko.io/task-kill-timestamp";

/// Annotation marking a kill that originated from the pending timeout
pub const ANNOTATION_KILLED_FROM_PENDING_TIMEOUT: &str =
    "execution.furiko.io/killed-from-pending-timeout";

/// Label tying a task back to its owning Job
pub const LABEL_JOB_NAME: &str = "execution.furiko.io/job-name";

/// Finalizer standing in for the runtime's reap of a deleted task
pub const TASK_REAPER_FINALIZER: &str = "execution.furiko.io/task-reaper";

/// One runtime attempt for a Job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub metadata: ObjectMeta,
    pub spec: TaskSpec,
    #[serde(default)]
    pub status: TaskRuntimeStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub job_name: String,
    pub retry_index: i64,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
    /// Seconds the runtime allows the task to run past its start before
    /// terminating it; set by the soft-kill stage
    #[serde(default)]
    pub active_deadline_seconds: Option<i64>,
}

/// What the runtime reports about a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRuntimeStatus {
    #[serde(default)]
    pub phase: TaskPhase,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finish_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub container_states: Vec<ContainerState>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskPhase::Succeeded | TaskPhase::Failed)
    }
}

impl Task {
    /// The kill instant recorded on this task, if any
    pub fn kill_timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.metadata.annotation(ANNOTATION_KILL_TIMESTAMP)?;
        let unix: i64 = raw.parse().ok()?;
        DateTime::from_timestamp(unix, 0)
    }

    pub fn is_kill_requested(&self) -> bool {
        self.metadata
            .annotations
            .contains_key(ANNOTATION_KILL_TIMESTAMP)
    }

    pub fn is_killed_from_pending_timeout(&self) -> bool {
        self.metadata
            .annotation(ANNOTATION_KILLED_FROM_PENDING_TIMEOUT)
            == Some("1")
    }

    pub fn is_terminal(&self) -> bool {
        self.status.phase.is_terminal()
    }

    /// The status this task contributes to its Job's task ref
    pub fn derived_status(&self) -> TaskStatus {
        match self.status.phase {
            TaskPhase::Pending => {
                if self.is_kill_requested() {
                    TaskStatus {
                        state: TaskState::Killing,
                        result: None,
                        reason: self.status.reason.clone(),
                        message: self.status.message.clone(),
                    }
                } else {
                    TaskStatus {
                        state: TaskState::Staging,
                        result: None,
                        reason: self.status.reason.clone(),
                        message: self.status.message.clone(),
                    }
                }
            }
            TaskPhase::Running => {
                let state = if self.is_kill_requested() {
                    TaskState::Killing
                } else {
                    TaskState::Running
                };
                TaskStatus {
                    state,
                    result: None,
                    reason: String::new(),
                    message: String::new(),
                }
            }
            TaskPhase::Succeeded => TaskStatus::finished(JobResult::Succeeded, "", ""),
            TaskPhase::Failed => {
                if self.is_kill_requested() {
                    TaskStatus::finished(
                        JobResult::Killed,
                        "DeadlineExceeded",
                        "Task was killed after its deadline",
                    )
                } else {
                    TaskStatus::finished(
                        JobResult::Failed,
                        self.status.reason.clone(),
                        self.status.message.clone(),
                    )
                }
            }
        }
    }
}

impl StoreObject for Task {
    const KIND: &'static str = "Task";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
