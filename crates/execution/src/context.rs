// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared controller context
//!
//! Bundles the stores, the dynamic config manager, the active-job index
//! and the clock. Cloning is cheap: everything is behind an `Arc`.

use crate::store::ActiveJobStore;
use crate::tasks::{StoreTaskExecutor, Task};
use furiko_core::job::Job;
use furiko_core::jobconfig::JobConfig;
use furiko_runtime::clock::Clock;
use furiko_runtime::config::{ConfigManager, DefaultsLoader};
use furiko_runtime::store::ObjectStore;
use std::sync::Arc;

/// Everything a controller needs to reconcile
pub struct Context<C: Clock> {
    pub clock: C,
    pub job_configs: Arc<ObjectStore<JobConfig, C>>,
    pub jobs: Arc<ObjectStore<Job, C>>,
    pub tasks: Arc<ObjectStore<Task, C>>,
    pub config: Arc<ConfigManager>,
    pub active_jobs: Arc<ActiveJobStore>,
}

impl<C: Clock> Context<C> {
    /// A context with empty stores and the bootstrap config defaults
    pub fn new(clock: C) -> Self {
        let config = ConfigManager::new();
        config.add_loader(Arc::new(DefaultsLoader::bootstrap()));
        Self::with_config(clock, Arc::new(config))
    }

    pub fn with_config(clock: C, config: Arc<ConfigManager>) -> Self {
        Self {
            job_configs: Arc::new(ObjectStore::new(clock.clone())),
            jobs: Arc::new(ObjectStore::new(clock.clone())),
            tasks: Arc::new(ObjectStore::new(clock.clone())),
            config,
            active_jobs: Arc::new(ActiveJobStore::new()),
            clock,
        }
    }

    /// A task executor backed by this context's task store
    pub fn task_executor(&self) -> Arc<StoreTaskExecutor<C>> {
        Arc::new(StoreTaskExecutor::new(Arc::clone(&self.tasks)))
    }
}

impl<C: Clock> Clone for Context<C> {
    fn clone(&self) -> Self {
        Self {
            clock: self.clock.clone(),
            job_configs: Arc::clone(&self.job_configs),
            jobs: Arc::clone(&self.jobs),
            tasks: Arc::clone(&self.tasks),
            config: Arc::clone(&self.config),
            active_jobs: Arc::clone(&self.active_jobs),
        }
    }
}
