// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory versioned object store with watch semantics
//!
//! Stands in for the host store the controllers are written against. The
//! contract is exactly what the reconcilers need:
//! - create-if-not-exists (a name conflict is an error the caller may treat
//!   as success for idempotent emission)
//! - compare-and-swap updates keyed on `resource_version`
//! - finalizer-aware deletion: deleting an object with finalizers only
//!   stamps `deletion_timestamp`; removal happens when the last finalizer
//!   is removed
//! - watch subscriptions delivering events in apply order
//!
//! All events are emitted while holding the write lock, so every subscriber
//! observes the same total order the store applied.

use crate::clock::Clock;
use furiko_core::id::{IdGen, UuidIdGen};
use furiko_core::meta::ObjectMeta;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;

/// An object the store can hold
pub trait StoreObject: Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn metadata(&self) -> &ObjectMeta;
    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> String {
        self.metadata().key()
    }
}

/// A change observed through a watch subscription
#[derive(Debug, Clone)]
pub enum StoreEvent<T> {
    Added(T),
    Updated { old: T, new: T },
    Deleted(T),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} {key:?} already exists")]
    AlreadyExists { kind: &'static str, key: String },
    #[error("{kind} {key:?} not found")]
    NotFound { kind: &'static str, key: String },
    #[error("{kind} {key:?} version conflict: expected {expected}, got {got}")]
    Conflict {
        kind: &'static str,
        key: String,
        expected: u64,
        got: u64,
    },
}

impl StoreError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// In-memory store for one object kind
pub struct ObjectStore<T: StoreObject, C: Clock, G: IdGen = UuidIdGen> {
    clock: C,
    ids: G,
    objects: RwLock<HashMap<String, T>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<StoreEvent<T>>>>,
}

impl<T: StoreObject, C: Clock> ObjectStore<T, C, UuidIdGen> {
    pub fn new(clock: C) -> Self {
        Self::with_id_gen(clock, UuidIdGen)
    }
}

impl<T: StoreObject, C: Clock, G: IdGen> ObjectStore<T, C, G> {
    pub fn with_id_gen(clock: C, ids: G) -> Self {
        Self {
            clock,
            ids,
            objects: RwLock::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Create an object, stamping uid, version and creation time
    pub fn create(&self, mut obj: T) -> Result<T, StoreError> {
        let key = obj.key();
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists { kind: T::KIND, key });
        }

        let meta = obj.metadata_mut();
        if meta.uid.is_empty() {
            meta.uid = self.ids.next();
        }
        meta.resource_version = 1;
        meta.creation_timestamp = self.clock.now();
        meta.deletion_timestamp = None;

        objects.insert(key, obj.clone());
        self.emit(StoreEvent::Added(obj.clone()));
        Ok(obj)
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// All objects, ordered by key for deterministic iteration
    pub fn list(&self) -> Vec<T> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        let mut items: Vec<T> = objects.values().cloned().collect();
        items.sort_by_key(|o| o.key());
        items
    }

    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compare-and-swap update on `resource_version`
    ///
    /// When the update empties the finalizer list of an object that is
    /// already deleting, the object is removed instead.
    pub fn update(&self, mut obj: T) -> Result<T, StoreError> {
        let key = obj.key();
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        let current = objects.get(&key).ok_or_else(|| StoreError::NotFound {
            kind: T::KIND,
            key: key.clone(),
        })?;

        let current_meta = current.metadata();
        if current_meta.resource_version != obj.metadata().resource_version {
            return Err(StoreError::Conflict {
                kind: T::KIND,
                key,
                expected: current_meta.resource_version,
                got: obj.metadata().resource_version,
            });
        }

        // Identity and deletion state belong to the store, not the caller.
        let uid = current_meta.uid.clone();
        let creation_timestamp = current_meta.creation_timestamp;
        let deletion_timestamp = current_meta.deletion_timestamp;
        let old = current.clone();

        let meta = obj.metadata_mut();
        meta.uid = uid;
        meta.creation_timestamp = creation_timestamp;
        meta.deletion_timestamp = deletion_timestamp;
        meta.resource_version += 1;

        if meta.deletion_timestamp.is_some() && meta.finalizers.is_empty() {
            objects.remove(&key);
            self.emit(StoreEvent::Updated {
                old,
                new: obj.clone(),
            });
            self.emit(StoreEvent::Deleted(obj.clone()));
            return Ok(obj);
        }

        objects.insert(key, obj.clone());
        self.emit(StoreEvent::Updated {
            old,
            new: obj.clone(),
        });
        Ok(obj)
    }

    /// Delete an object, honouring finalizers
    ///
    /// With finalizers present this only stamps the deletion timestamp; the
    /// object is removed when the last finalizer is removed via `update`.
    pub fn delete(&self, key: &str) -> Result<T, StoreError> {
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        let mut obj = objects.remove(key).ok_or_else(|| StoreError::NotFound {
            kind: T::KIND,
            key: key.to_string(),
        })?;

        if obj.metadata().finalizers.is_empty() {
            self.emit(StoreEvent::Deleted(obj.clone()));
            return Ok(obj);
        }

        if obj.metadata().deletion_timestamp.is_some() {
            // Already deleting; nothing more to do until finalizers clear.
            objects.insert(key.to_string(), obj.clone());
            return Ok(obj);
        }

        let old = obj.clone();
        let meta = obj.metadata_mut();
        meta.deletion_timestamp = Some(self.clock.now());
        meta.resource_version += 1;
        objects.insert(key.to_string(), obj.clone());
        self.emit(StoreEvent::Updated {
            old,
            new: obj.clone(),
        });
        Ok(obj)
    }

    /// Remove an object immediately, bypassing finalizers
    pub fn force_delete(&self, key: &str) -> Result<T, StoreError> {
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        let obj = objects.remove(key).ok_or_else(|| StoreError::NotFound {
            kind: T::KIND,
            key: key.to_string(),
        })?;
        self.emit(StoreEvent::Deleted(obj.clone()));
        Ok(obj)
    }

    /// Subscribe to changes applied after this call
    pub fn watch(&self) -> mpsc::UnboundedReceiver<StoreEvent<T>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Subscribe, first replaying every existing object as Added
    ///
    /// Replay and registration happen under the store lock, so no event is
    /// missed or observed twice.
    pub fn watch_with_initial(&self) -> mpsc::UnboundedReceiver<StoreEvent<T>> {
        let objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        let (tx, rx) = mpsc::unbounded_channel();

        let mut items: Vec<&T> = objects.values().collect();
        items.sort_by_key(|o| o.key());
        for obj in items {
            let _ = tx.send(StoreEvent::Added(obj.clone()));
        }

        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        drop(objects);
        rx
    }

    fn emit(&self, event: StoreEvent<T>) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
