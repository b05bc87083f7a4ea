// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task executor: the controllers' only handle on the task runtime

use super::{Task, ANNOTATION_KILL_TIMESTAMP, LABEL_JOB_NAME, TASK_REAPER_FINALIZER};
use chrono::{DateTime, Utc};
use furiko_runtime::clock::Clock;
use furiko_runtime::store::{ObjectStore, StoreError, StoreObject};
use std::sync::Arc;

/// Operations the lifecycle controller needs from the task runtime
pub trait TaskExecutor: Send + Sync {
    /// Live tasks belonging to a Job
    fn list_for_job(&self, namespace: &str, job_name: &str) -> Vec<Task>;

    fn get(&self, key: &str) -> Option<Task>;

    /// Launch a task; a name conflict means a previous attempt already
    /// created it
    fn create(&self, task: Task) -> Result<Task, StoreError>;

    /// Soft kill: record the kill instant and bound the task's runtime so
    /// the container terminates gracefully
    fn apply_kill(
        &self,
        key: &str,
        kill_at: DateTime<Utc>,
        extra_annotations: &[(&str, &str)],
    ) -> Result<Task, StoreError>;

    /// Graceful deletion; the task stays observable until reaped
    fn delete(&self, key: &str) -> Result<Task, StoreError>;

    /// Forced deletion, bypassing the grace period
    fn force_delete(&self, key: &str) -> Result<Task, StoreError>;
}

/// Executor backed by the in-memory object store
///
/// Doubles as the test fake: tests flip task phases directly in the store
/// to simulate the runtime.
pub struct StoreTaskExecutor<C: Clock> {
    store: Arc<ObjectStore<Task, C>>,
}

impl<C: Clock> StoreTaskExecutor<C> {
    pub fn new(store: Arc<ObjectStore<Task, C>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ObjectStore<Task, C>> {
        &self.store
    }
}

impl<C: Clock> TaskExecutor for StoreTaskExecutor<C> {
    fn list_for_job(&self, namespace: &str, job_name: &str) -> Vec<Task> {
        self.store
            .list()
            .into_iter()
            .filter(|t| {
                t.metadata.namespace == namespace
                    && t.metadata.labels.get(LABEL_JOB_NAME).map(|s| s.as_str()) == Some(job_name)
            })
            .collect()
    }

    fn get(&self, key: &str) -> Option<Task> {
        self.store.get(key)
    }

    fn create(&self, mut task: Task) -> Result<Task, StoreError> {
        task.metadata
            .labels
            .insert(LABEL_JOB_NAME.to_string(), task.spec.job_name.clone());
        task.metadata.add_finalizer(TASK_REAPER_FINALIZER);
        self.store.create(task)
    }

    fn apply_kill(
        &self,
        key: &str,
        kill_at: DateTime<Utc>,
        extra_annotations: &[(&str, &str)],
    ) -> Result<Task, StoreError> {
        let mut task = self.store.get(key).ok_or(StoreError::NotFound {
            kind: Task::KIND,
            key: key.to_string(),
        })?;

        task.metadata
            .set_annotation(ANNOTATION_KILL_TIMESTAMP, kill_at.timestamp().to_string());
        for (k, v) in extra_annotations {
            task.metadata.set_annotation(*k, *v);
        }

        // Ask the runtime to terminate the container once the deadline
        // elapses, measured from the task's start.
        let reference = task
            .status
            .start_time
            .unwrap_or(task.metadata.creation_timestamp);
        let deadline = (kill_at - reference).num_seconds().max(0);
        task.spec.active_deadline_seconds = Some(deadline);

        self.store.update(task)
    }

    fn delete(&self, key: &str) -> Result<Task, StoreError> {
        self.store.delete(key)
    }

    fn force_delete(&self, key: &str) -> Result<Task, StoreError> {
        self.store.force_delete(key)
    }
}
