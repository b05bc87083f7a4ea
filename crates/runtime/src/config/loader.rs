// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config loaders and the manager composing them
//!
//! Loaders are ordered; for any config name, the latest loader with a
//! non-empty payload wins. Override granularity is the whole named config,
//! not individual fields.

use super::types::{
    ConfigName, CronExecutionConfig, JobConfigExecutionConfig, JobExecutionConfig,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config loader {loader} failed: {message}")]
    Loader { loader: String, message: String },
    #[error("cannot deserialize {name}: {source}")]
    Deserialize {
        name: ConfigName,
        source: serde_json::Error,
    },
}

/// Publishes config payloads by name
pub trait ConfigLoader: Send + Sync {
    fn name(&self) -> &str;

    /// The payload for a config name, or None when this loader has nothing
    fn load(&self, name: ConfigName) -> Result<Option<Value>, ConfigError>;
}

/// Bottom-of-stack loader serving preloaded payloads
pub struct DefaultsLoader {
    defaults: HashMap<ConfigName, Value>,
}

impl DefaultsLoader {
    /// An empty loader; payloads are added with [`set`](Self::set)
    pub fn new() -> Self {
        Self {
            defaults: HashMap::new(),
        }
    }

    /// A loader carrying the documented defaults for every config
    pub fn bootstrap() -> Self {
        let mut loader = Self::new();
        loader.set_payload(
            ConfigName::JobExecutionConfig,
            &JobExecutionConfig::bootstrap(),
        );
        loader.set_payload(
            ConfigName::JobConfigExecutionConfig,
            &JobConfigExecutionConfig::bootstrap(),
        );
        loader.set_payload(
            ConfigName::CronExecutionConfig,
            &CronExecutionConfig::bootstrap(),
        );
        loader
    }

    pub fn set(&mut self, name: ConfigName, value: Value) {
        self.defaults.insert(name, value);
    }

    fn set_payload<T: serde::Serialize>(&mut self, name: ConfigName, payload: &T) {
        if let Ok(value) = serde_json::to_value(payload) {
            self.defaults.insert(name, value);
        }
    }
}

impl Default for DefaultsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader for DefaultsLoader {
    fn name(&self) -> &str {
        "DefaultsLoader"
    }

    fn load(&self, name: ConfigName) -> Result<Option<Value>, ConfigError> {
        Ok(self.defaults.get(&name).cloned())
    }
}

/// Composes ordered loaders into typed, hot-reloaded views
pub struct ConfigManager {
    loaders: RwLock<Vec<Arc<dyn ConfigLoader>>>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            loaders: RwLock::new(Vec::new()),
        }
    }

    /// Append a loader; later loaders override earlier ones
    pub fn add_loader(&self, loader: Arc<dyn ConfigLoader>) {
        self.loaders
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(loader);
    }

    /// The effective raw payload for a name: the latest loader's non-empty
    /// payload, or an empty object
    pub fn load(&self, name: ConfigName) -> Result<Value, ConfigError> {
        let loaders = self.loaders.read().unwrap_or_else(|e| e.into_inner());
        for loader in loaders.iter().rev() {
            if let Some(value) = loader.load(name)? {
                let empty = value.as_object().map(|o| o.is_empty()).unwrap_or(false);
                if !empty {
                    return Ok(value);
                }
            }
        }
        Ok(Value::Object(serde_json::Map::new()))
    }

    /// Typed view of the job lifecycle config
    pub fn jobs(&self) -> Result<JobExecutionConfig, ConfigError> {
        self.typed(ConfigName::JobExecutionConfig)
    }

    /// Typed view of the admission config
    pub fn job_configs(&self) -> Result<JobConfigExecutionConfig, ConfigError> {
        self.typed(ConfigName::JobConfigExecutionConfig)
    }

    /// Typed view of the cron config
    pub fn cron(&self) -> Result<CronExecutionConfig, ConfigError> {
        self.typed(ConfigName::CronExecutionConfig)
    }

    fn typed<T: serde::de::DeserializeOwned>(&self, name: ConfigName) -> Result<T, ConfigError> {
        let value = self.load(name)?;
        serde_json::from_value(value).map_err(|source| ConfigError::Deserialize { name, source })
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
