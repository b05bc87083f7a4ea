// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rate-limited delayed work-queue with per-key serialisation
//!
//! Reconcilers are keyed by object identity; the queue guarantees that at
//! most one worker holds any given key at a time. A key added while it is
//! being processed is parked and re-queued when the worker calls `done`,
//! so no update is ever lost and no key is ever reconciled concurrently.
//!
//! `add_rate_limited` applies per-key exponential backoff for transient
//! failures; `forget` resets the key's failure count after a clean pass.

use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Mutex;

/// Base delay for the first rate-limited retry
const BASE_DELAY_MS: i64 = 5;
/// Ceiling for rate-limited retries
const MAX_DELAY_MS: i64 = 1000 * 1000;

/// A delayed queue of reconcile keys
pub struct WorkQueue<C: Clock> {
    clock: C,
    inner: Mutex<Inner>,
}

struct Inner {
    /// Earliest requested ready time per pending key
    pending: HashMap<String, DateTime<Utc>>,
    heap: BinaryHeap<Reverse<(DateTime<Utc>, u64, String)>>,
    seq: u64,
    /// Keys currently held by a worker
    processing: HashSet<String>,
    /// Keys re-added while processing, re-queued on `done`
    parked: HashMap<String, DateTime<Utc>>,
    failures: HashMap<String, u32>,
    shut_down: bool,
}

impl<C: Clock> WorkQueue<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            inner: Mutex::new(Inner {
                pending: HashMap::new(),
                heap: BinaryHeap::new(),
                seq: 0,
                processing: HashSet::new(),
                parked: HashMap::new(),
                failures: HashMap::new(),
                shut_down: false,
            }),
        }
    }

    /// Enqueue a key for immediate processing
    pub fn add(&self, key: impl Into<String>) {
        let now = self.clock.now();
        self.add_at(key.into(), now);
    }

    /// Enqueue a key to become ready after a delay; the earliest requested
    /// time wins if the key is already pending
    pub fn add_after(&self, key: impl Into<String>, delay: Duration) {
        let at = self.clock.now() + delay;
        self.add_at(key.into(), at);
    }

    /// Enqueue a key with exponential backoff based on its failure count
    pub fn add_rate_limited(&self, key: impl Into<String>) {
        let key = key.into();
        let delay = {
            let mut inner = self.lock();
            if inner.shut_down {
                return;
            }
            let failures = inner.failures.entry(key.clone()).or_insert(0);
            *failures += 1;
            backoff_delay(*failures)
        };
        self.add_after(key, delay);
    }

    /// Reset a key's failure count
    pub fn forget(&self, key: &str) {
        self.lock().failures.remove(key);
    }

    /// The number of rate-limited retries recorded for a key
    pub fn num_requeues(&self, key: &str) -> u32 {
        self.lock().failures.get(key).copied().unwrap_or(0)
    }

    /// Pop a ready key, marking it in-flight until `done` is called
    pub fn get(&self) -> Option<String> {
        let now = self.clock.now();
        let mut inner = self.lock();
        if inner.shut_down {
            return None;
        }

        while let Some(Reverse((at, _, key))) = inner.heap.peek().cloned() {
            // Stale entries (superseded by an earlier add) are dropped.
            match inner.pending.get(&key) {
                Some(&want) if want == at => {}
                _ => {
                    inner.heap.pop();
                    continue;
                }
            }
            if at > now {
                return None;
            }

            inner.heap.pop();
            inner.pending.remove(&key);
            inner.processing.insert(key.clone());
            return Some(key);
        }
        None
    }

    /// Release a key after processing, re-queueing it if it was re-added
    /// while in flight
    pub fn done(&self, key: &str) {
        let mut inner = self.lock();
        inner.processing.remove(key);
        if let Some(at) = inner.parked.remove(key) {
            push(&mut inner, key.to_string(), at);
        }
    }

    /// The number of keys waiting (not in flight)
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The earliest instant any pending key becomes ready
    pub fn next_ready_at(&self) -> Option<DateTime<Utc>> {
        self.lock().pending.values().min().copied()
    }

    /// Stop handing out items; subsequent adds are dropped
    pub fn shut_down(&self) {
        self.lock().shut_down = true;
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    fn add_at(&self, key: String, at: DateTime<Utc>) {
        let mut inner = self.lock();
        if inner.shut_down {
            return;
        }
        if inner.processing.contains(&key) {
            let entry = inner.parked.entry(key).or_insert(at);
            if at < *entry {
                *entry = at;
            }
            return;
        }
        push(&mut inner, key, at);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn push(inner: &mut Inner, key: String, at: DateTime<Utc>) {
    match inner.pending.get(&key) {
        // An earlier pending entry wins; keep it.
        Some(&existing) if existing <= at => return,
        _ => {}
    }
    inner.pending.insert(key.clone(), at);
    inner.seq += 1;
    let seq = inner.seq;
    inner.heap.push(Reverse((at, seq, key)));
}

fn backoff_delay(failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(31);
    let delay_ms = BASE_DELAY_MS.saturating_mul(1i64 << exponent);
    Duration::milliseconds(delay_ms.min(MAX_DELAY_MS))
}

#[cfg(test)]
#[path = "workqueue_tests.rs"]
mod tests;
