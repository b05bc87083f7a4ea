// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Field-path validation errors
//!
//! Validation never stops at the first problem: each check appends to an
//! [`ErrorList`] carrying the field path it applies to, and the caller
//! decides whether the aggregate is fatal. The aggregate renders as a
//! single human-readable message suitable for an admission response or a
//! Job's terminal status.

use std::fmt;

/// A single validation failure attached to a field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// A value that failed validation
    pub fn invalid(path: impl Into<String>, value: impl fmt::Display, detail: &str) -> Self {
        Self::new(path, format!("invalid value {:?}: {}", value.to_string(), detail))
    }

    /// A required value that was missing
    pub fn required(path: impl Into<String>, detail: &str) -> Self {
        Self::new(path, format!("required value: {}", detail))
    }

    /// A value that collides with an existing one
    pub fn duplicate(path: impl Into<String>, value: impl fmt::Display) -> Self {
        Self::new(path, format!("duplicate value {:?}", value.to_string()))
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// An ordered collection of field errors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorList(Vec<FieldError>);

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: FieldError) {
        self.0.push(err);
    }

    pub fn extend(&mut self, other: ErrorList) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Collapse into a single error message, or None if empty
    pub fn to_aggregate(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }
        let msgs: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        Some(msgs.join("; "))
    }

    /// Ok when empty, Err with the aggregate message otherwise
    pub fn into_result(self) -> Result<(), String> {
        match self.to_aggregate() {
            None => Ok(()),
            Some(msg) => Err(msg),
        }
    }
}

impl From<FieldError> for ErrorList {
    fn from(err: FieldError) -> Self {
        Self(vec![err])
    }
}

impl IntoIterator for ErrorList {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_aggregate() {
            Some(msg) => write!(f, "{}", msg),
            None => write!(f, "no errors"),
        }
    }
}
