// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job option schema and evaluation
//!
//! An OptionSpec is an ordered list of typed parameters attached to a
//! JobConfig. Each option type carries its own configuration variant, and
//! both validation and evaluation dispatch on that variant:
//! - **Bool**: formatted as one of several literal pairs
//! - **String**: raw input, optionally trimmed
//! - **Select**: one of a fixed set of values, or free text if allowed
//! - **Multi**: a delimited join of validated members
//! - **Date**: an RFC3339 instant rendered through a human format pattern
//!
//! Validation aggregates field errors; evaluation materialises exactly one
//! canonical string per option.

mod evaluate;
mod format;


pub use evaluate::{
    evaluate_option, evaluate_option_default, evaluate_options, EVALUATED_KEY_PREFIX,
};
pub use format::format_date;

use crate::validation::{ErrorList, FieldError};
use serde::{Deserialize, Serialize};

/// Ordered list of options attached to a JobConfig
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    #[serde(default)]
    pub options: Vec<JobOption>,
}

/// A single declarative parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOption {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub option_type: OptionType,
}

/// Per-type option configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OptionType {
    Bool(BoolOptionConfig),
    String(StringOptionConfig),
    Select(SelectOptionConfig),
    Multi(MultiOptionConfig),
    Date(DateOptionConfig),
}

impl OptionType {
    /// The type name as it appears in serialized form
    pub fn name(&self) -> &'static str {
        match self {
            OptionType::Bool(_) => "bool",
            OptionType::String(_) => "string",
            OptionType::Select(_) => "select",
            OptionType::Multi(_) => "multi",
            OptionType::Date(_) => "date",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoolOptionConfig {
    #[serde(default)]
    pub default: bool,
    /// How the boolean renders as a string; must be set
    #[serde(default)]
    pub format: Option<BoolOptionFormat>,
    /// Literal used for true under the custom format
    #[serde(default)]
    pub true_val: String,
    /// Literal used for false under the custom format
    #[serde(default)]
    pub false_val: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolOptionFormat {
    TrueFalse,
    OneZero,
    YesNo,
    Custom,
}

impl BoolOptionConfig {
    /// Render a boolean using the configured format
    ///
    /// Assumes the config has passed validation; an unset format falls back
    /// to true/false literals.
    pub fn format_value(&self, value: bool) -> String {
        match self.format.unwrap_or(BoolOptionFormat::TrueFalse) {
            BoolOptionFormat::TrueFalse => value.to_string(),
            BoolOptionFormat::OneZero => if value { "1" } else { "0" }.to_string(),
            BoolOptionFormat::YesNo => if value { "yes" } else { "no" }.to_string(),
            BoolOptionFormat::Custom => {
                if value {
                    self.true_val.clone()
                } else {
                    self.false_val.clone()
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StringOptionConfig {
    /// Used when no value is provided; an explicitly cleared value does not
    /// fall back to this
    #[serde(default)]
    pub default: String,
    #[serde(default)]
    pub trim_spaces: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectOptionConfig {
    #[serde(default)]
    pub default: String,
    pub values: Vec<String>,
    #[serde(default)]
    pub allow_custom: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiOptionConfig {
    #[serde(default)]
    pub default: Vec<String>,
    pub values: Vec<String>,
    #[serde(default)]
    pub allow_custom: bool,
    /// Joins the selected members; defaults to the empty string
    #[serde(default)]
    pub delimiter: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateOptionConfig {
    /// Human format pattern such as `D MMM YYYY`; empty keeps RFC3339
    #[serde(default)]
    pub format: String,
}

/// Validate a whole OptionSpec, aggregating every field error
pub fn validate_option_spec(spec: &OptionSpec, path: &str) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut seen = std::collections::BTreeSet::new();

    for (i, option) in spec.options.iter().enumerate() {
        let option_path = format!("{}.options[{}]", path, i);
        errs.extend(validate_job_option(option, &option_path));
        if !option.name.is_empty() && !seen.insert(option.name.clone()) {
            errs.push(FieldError::duplicate(
                format!("{}.name", option_path),
                &option.name,
            ));
        }
    }

    errs
}

/// Validate a single option definition
pub fn validate_job_option(option: &JobOption, path: &str) -> ErrorList {
    let mut errs = ErrorList::new();

    let name_path = format!("{}.name", path);
    if option.name.is_empty() {
        errs.push(FieldError::required(name_path, "name must be specified"));
    } else if !is_valid_option_name(&option.name) {
        errs.push(FieldError::invalid(
            name_path,
            &option.name,
            "name must consist only of alphanumeric characters, '_', '.' and '-'",
        ));
    }

    match &option.option_type {
        OptionType::Bool(cfg) => {
            if cfg.format.is_none() {
                errs.push(FieldError::required(
                    format!("{}.format", path),
                    "format must be specified",
                ));
            }
            if option.required {
                errs.push(FieldError::invalid(
                    format!("{}.required", path),
                    "true",
                    "bool option cannot be required",
                ));
            }
        }
        OptionType::String(_) => {}
        OptionType::Select(cfg) => {
            errs.extend(validate_value_set(&cfg.values, path));
            if !cfg.default.is_empty() && !cfg.allow_custom && !cfg.values.contains(&cfg.default) {
                errs.push(FieldError::invalid(
                    format!("{}.default", path),
                    &cfg.default,
                    "default must be one of the allowed values",
                ));
            }
        }
        OptionType::Multi(cfg) => {
            errs.extend(validate_value_set(&cfg.values, path));
            for (i, default) in cfg.default.iter().enumerate() {
                let default_path = format!("{}.default[{}]", path, i);
                if default.is_empty() {
                    errs.push(FieldError::invalid(
                        default_path,
                        default,
                        "default value cannot be empty",
                    ));
                } else if !cfg.allow_custom && !cfg.values.contains(default) {
                    errs.push(FieldError::invalid(
                        default_path,
                        default,
                        "default must be one of the allowed values",
                    ));
                }
            }
        }
        OptionType::Date(_) => {}
    }

    errs
}

fn validate_value_set(values: &[String], path: &str) -> ErrorList {
    let mut errs = ErrorList::new();
    if values.is_empty() {
        errs.push(FieldError::required(
            format!("{}.values", path),
            "at least one value must be specified",
        ));
    }
    for (i, value) in values.iter().enumerate() {
        if value.is_empty() {
            errs.push(FieldError::invalid(
                format!("{}.values[{}]", path, i),
                value,
                "value cannot be empty",
            ));
        }
    }
    errs
}

fn is_valid_option_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}
