// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Active-Job Store: (namespace, config uid) → live Job uids
//!
//! Fed purely from Job watch events; lifetime bound to the process. A Job
//! is *inflight* once it has been admitted and until it records a terminal
//! condition; *queued* covers the span before admission. Both reconcilers
//! read this index concurrently, so locking is a coarse `RwLock` sized for
//! thousands of configs and tens of thousands of Jobs.

use furiko_core::job::Job;
use furiko_runtime::store::StoreEvent;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

type ConfigKey = (String, String);

#[derive(Default)]
struct Index {
    inflight: HashMap<ConfigKey, HashSet<String>>,
    queued: HashMap<ConfigKey, HashSet<String>>,
}

/// Index of live Jobs grouped by owning JobConfig
#[derive(Default)]
pub struct ActiveJobStore {
    index: RwLock<Index>,
}

impl ActiveJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one Job watch event
    pub fn on_job_event(&self, event: &StoreEvent<Job>) {
        match event {
            StoreEvent::Added(job) | StoreEvent::Updated { new: job, .. } => self.observe(job),
            StoreEvent::Deleted(job) => self.remove(job),
        }
    }

    /// Record the current state of a Job
    pub fn observe(&self, job: &Job) {
        let Some(config_key) = config_key(job) else {
            return;
        };
        let uid = job.metadata.uid.clone();
        let mut index = self.lock_write();

        let inflight = job.is_started() && !job.is_finished();
        update_membership(&mut index.inflight, &config_key, &uid, inflight);

        let queued = !job.is_started() && !job.is_finished() && !job.metadata.is_deleting();
        update_membership(&mut index.queued, &config_key, &uid, queued);
    }

    /// Drop a deleted Job from the index
    pub fn remove(&self, job: &Job) {
        let Some(config_key) = config_key(job) else {
            return;
        };
        let uid = &job.metadata.uid;
        let mut index = self.lock_write();
        update_membership(&mut index.inflight, &config_key, uid, false);
        update_membership(&mut index.queued, &config_key, uid, false);
    }

    /// Number of admitted, unfinished Jobs for a config
    pub fn count_inflight(&self, namespace: &str, config_uid: &str) -> usize {
        self.lock_read()
            .inflight
            .get(&(namespace.to_string(), config_uid.to_string()))
            .map(|s| s.len())
            .unwrap_or(0)
    }

    pub fn any_inflight(&self, namespace: &str, config_uid: &str) -> bool {
        self.count_inflight(namespace, config_uid) > 0
    }

    /// Number of created-but-unadmitted Jobs for a config
    pub fn count_queued(&self, namespace: &str, config_uid: &str) -> usize {
        self.lock_read()
            .queued
            .get(&(namespace.to_string(), config_uid.to_string()))
            .map(|s| s.len())
            .unwrap_or(0)
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, Index> {
        self.index.read().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, Index> {
        self.index.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn config_key(job: &Job) -> Option<ConfigKey> {
    let config_ref = job.spec.config_ref.as_ref()?;
    Some((job.metadata.namespace.clone(), config_ref.uid.clone()))
}

fn update_membership(
    map: &mut HashMap<ConfigKey, HashSet<String>>,
    key: &ConfigKey,
    uid: &str,
    member: bool,
) {
    if member {
        map.entry(key.clone()).or_default().insert(uid.to_string());
        return;
    }
    if let Some(set) = map.get_mut(key) {
        set.remove(uid);
        if set.is_empty() {
            map.remove(key);
        }
    }
}
