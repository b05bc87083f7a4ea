// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciler contract and worker-pool controller
//!
//! A reconciler is a pure-ish function from a key to a result; the
//! controller owns the queue, the retry policy and the worker pool. No
//! async leaks into reconciler implementations: reconcile bodies are
//! synchronous end-to-end, and waiting is expressed as `RequeueAfter`.
//!
//! Error policy: transient failures are retried with per-key backoff and
//! never surface; permanent failures are logged and dropped, because the
//! user-facing explanation lives in the affected object's status.

use crate::clock::Clock;
use crate::workqueue::WorkQueue;
use chrono::Duration;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Outcome of a successful reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileResult {
    /// Nothing further to do until the next informer event
    Done,
    /// Revisit this key after the given delay
    RequeueAfter(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// Retried with backoff; typically a store conflict or informer lag
    #[error("transient: {0}")]
    Transient(String),
    /// Not retried; the object's own status carries the explanation
    #[error("permanent: {0}")]
    Permanent(String),
}

/// The reconcile contract: idempotent, keyed by object identity
pub trait Reconciler: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Number of workers draining this reconciler's queue
    fn concurrency(&self) -> usize {
        4
    }

    fn reconcile(&self, key: &str) -> Result<ReconcileResult, ReconcileError>;
}

/// Runs a reconciler against a work-queue with a fixed worker pool
pub struct Controller<C: Clock> {
    reconciler: Arc<dyn Reconciler>,
    queue: Arc<WorkQueue<C>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<C: Clock> Controller<C> {
    pub fn new(reconciler: Arc<dyn Reconciler>, queue: Arc<WorkQueue<C>>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            reconciler,
            queue,
            shutdown_tx,
            shutdown_rx,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(&self) -> &Arc<WorkQueue<C>> {
        &self.queue
    }

    /// Spawn the worker pool
    pub fn start(&self) {
        let concurrency = self.reconciler.concurrency().max(1);
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());

        for worker in 0..concurrency {
            let reconciler = Arc::clone(&self.reconciler);
            let queue = Arc::clone(&self.queue);
            let mut shutdown_rx = self.shutdown_rx.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if !process_next(reconciler.as_ref(), queue.as_ref()) {
                        tokio::select! {
                            _ = shutdown_rx.changed() => {}
                            _ = tokio::time::sleep(std::time::Duration::from_millis(20)) => {}
                        }
                    }
                }
                tracing::debug!(
                    controller = reconciler.name(),
                    worker,
                    "worker stopped"
                );
            }));
        }
    }

    /// Process a single ready key on the calling thread
    ///
    /// Returns false when the queue had nothing ready. Used by the workers
    /// and directly by tests that need deterministic draining.
    pub fn process_next(&self) -> bool {
        process_next(self.reconciler.as_ref(), self.queue.as_ref())
    }

    /// Stop accepting work, let in-flight reconciles finish, and join the
    /// workers
    pub async fn shutdown(&self) {
        self.queue.shut_down();
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}

fn process_next<C: Clock>(reconciler: &dyn Reconciler, queue: &WorkQueue<C>) -> bool {
    let Some(key) = queue.get() else {
        return false;
    };

    match reconciler.reconcile(&key) {
        Ok(ReconcileResult::Done) => {
            queue.forget(&key);
        }
        Ok(ReconcileResult::RequeueAfter(delay)) => {
            queue.forget(&key);
            queue.add_after(key.clone(), delay);
        }
        Err(ReconcileError::Transient(reason)) => {
            warn!(
                controller = reconciler.name(),
                key = %key,
                retries = queue.num_requeues(&key),
                %reason,
                "transient reconcile failure, backing off"
            );
            queue.add_rate_limited(key.clone());
        }
        Err(ReconcileError::Permanent(reason)) => {
            error!(
                controller = reconciler.name(),
                key = %key,
                %reason,
                "permanent reconcile failure, dropping"
            );
            queue.forget(&key);
        }
    }
    queue.done(&key);
    true
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
