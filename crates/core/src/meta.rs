// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object metadata shared by all stored objects
//!
//! Every object carried by the store has a name, a namespace, a UID that
//! survives nothing (delete-and-recreate yields a new UID), and a resource
//! version used for compare-and-swap writes. Finalizers intercept deletion:
//! as long as any finalizer remains, a delete only stamps the deletion
//! timestamp and the object stays visible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata common to all stored objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub resource_version: u64,
    pub creation_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finalizers: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl Default for ObjectMeta {
    fn default() -> Self {
        Self {
            name: String::new(),
            namespace: String::new(),
            uid: String::new(),
            resource_version: 0,
            creation_timestamp: DateTime::<Utc>::UNIX_EPOCH,
            deletion_timestamp: None,
            finalizers: Vec::new(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }
}

impl ObjectMeta {
    /// Create metadata with a namespace and name
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// The store key, `namespace/name`
    pub fn key(&self) -> String {
        namespaced_key(&self.namespace, &self.name)
    }

    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    /// Add a finalizer if not already present
    pub fn add_finalizer(&mut self, finalizer: impl Into<String>) {
        let finalizer = finalizer.into();
        if !self.has_finalizer(&finalizer) {
            self.finalizers.push(finalizer);
        }
    }

    /// Remove a finalizer, returning whether it was present
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != finalizer);
        self.finalizers.len() != before
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(|s| s.as_str())
    }

    pub fn set_annotation(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.annotations.insert(key.into(), value.into());
    }
}

/// Format a store key from a namespace and name
pub fn namespaced_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

/// Split a store key back into (namespace, name)
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('/')
}
