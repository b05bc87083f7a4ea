// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Informer pumps: store watch streams feeding the work-queues
//!
//! Change events are translated into reconcile keys. Two extra behaviors
//! live here:
//! - every Job event updates the Active-Job Store before any queue add,
//!   so reconcilers always observe counts at least as fresh as the event
//!   that woke them
//! - a Job reaching its terminal condition flushes the owning config's
//!   queued Jobs, which is what lets Enqueue admissions proceed without
//!   polling

use crate::context::Context;
use furiko_core::job::Job;
use furiko_runtime::clock::Clock;
use furiko_runtime::store::StoreEvent;
use furiko_runtime::workqueue::WorkQueue;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[cfg(test)]
#[path = "informer_tests.rs"]
mod informer_tests;

/// Pump Job events into the admission and lifecycle queues
pub async fn run_job_informer<C: Clock>(
    context: Context<C>,
    admission_queue: Arc<WorkQueue<C>>,
    lifecycle_queue: Arc<WorkQueue<C>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut events = context.jobs.watch_with_initial();
    info!("job informer started");
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                handle_job_event(&context, &admission_queue, &lifecycle_queue, event);
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("job informer stopped");
}

fn handle_job_event<C: Clock>(
    context: &Context<C>,
    admission_queue: &WorkQueue<C>,
    lifecycle_queue: &WorkQueue<C>,
    event: StoreEvent<Job>,
) {
    context.active_jobs.on_job_event(&event);

    let (job, freed_capacity) = match &event {
        StoreEvent::Added(job) => (job, false),
        StoreEvent::Updated { old, new } => (new, new.is_finished() && !old.is_finished()),
        StoreEvent::Deleted(job) => (job, !job.is_finished()),
    };

    let key = job.metadata.key();
    admission_queue.add(key.clone());
    lifecycle_queue.add(key);

    // An inflight slot opened up: wake every queued sibling so Enqueue
    // admissions can proceed.
    if freed_capacity {
        if let Some(config_ref) = &job.spec.config_ref {
            for sibling in context.jobs.list() {
                let same_config = sibling.spec.config_ref.as_ref().map(|r| r.uid.as_str())
                    == Some(config_ref.uid.as_str());
                if same_config && !sibling.is_started() && !sibling.is_finished() {
                    admission_queue.add(sibling.metadata.key());
                }
            }
        }
    }
}

/// Pump task events into the lifecycle queue, keyed by the owning Job
pub async fn run_task_informer<C: Clock>(
    context: Context<C>,
    lifecycle_queue: Arc<WorkQueue<C>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut events = context.tasks.watch_with_initial();
    info!("task informer started");
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let task = match &event {
                    StoreEvent::Added(t) | StoreEvent::Deleted(t) => t,
                    StoreEvent::Updated { new, .. } => new,
                };
                lifecycle_queue.add(furiko_core::meta::namespaced_key(
                    &task.metadata.namespace,
                    &task.spec.job_name,
                ));
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("task informer stopped");
}
