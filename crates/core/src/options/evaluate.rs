// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Option evaluation: materialise one canonical string per option
//!
//! Evaluation assumes the option definition has already passed validation.
//! The value side is untrusted: inputs arrive as an opaque JSON bag on the
//! Job spec, so every value is checked against its option's type here.
//!
//! A provided empty string is an explicit clear and never falls back to the
//! default; a missing (or null) value does.

use super::format::format_date;
use super::{
    BoolOptionConfig, DateOptionConfig, JobOption, MultiOptionConfig, OptionSpec, OptionType,
    SelectOptionConfig, StringOptionConfig,
};
use crate::validation::{ErrorList, FieldError};
use serde_json::Value;
use std::collections::BTreeMap;

/// Prefix of every key produced by [`evaluate_options`]
pub const EVALUATED_KEY_PREFIX: &str = "option.";

/// Evaluate a whole option bag against a spec
///
/// Returns the flat `option.<name>` mapping plus every error encountered.
/// Unknown keys in the input are ignored; options missing from the input
/// evaluate with their default. A per-option failure does not stop the
/// remaining options from evaluating.
pub fn evaluate_options(
    values: &serde_json::Map<String, Value>,
    spec: Option<&OptionSpec>,
    path: &str,
) -> (BTreeMap<String, String>, ErrorList) {
    let mut evaluated = BTreeMap::new();
    let mut errs = ErrorList::new();

    let Some(spec) = spec else {
        return (evaluated, errs);
    };

    for option in &spec.options {
        let option_path = format!("{}.{}", path, option.name);
        match evaluate_option(values.get(&option.name), option, &option_path) {
            Ok(value) => {
                evaluated.insert(format!("{}{}", EVALUATED_KEY_PREFIX, option.name), value);
            }
            Err(option_errs) => errs.extend(option_errs),
        }
    }

    (evaluated, errs)
}

/// Evaluate a single option value into its canonical string
pub fn evaluate_option(
    value: Option<&Value>,
    option: &JobOption,
    path: &str,
) -> Result<String, ErrorList> {
    // JSON null carries the same meaning as an absent key.
    let value = value.filter(|v| !v.is_null());

    match &option.option_type {
        OptionType::Bool(cfg) => evaluate_bool(value, option, cfg, path),
        OptionType::String(cfg) => evaluate_string(value, option, cfg, path),
        OptionType::Select(cfg) => evaluate_select(value, option, cfg, path),
        OptionType::Multi(cfg) => evaluate_multi(value, option, cfg, path),
        OptionType::Date(cfg) => evaluate_date(value, option, cfg, path),
    }
}

/// Evaluate an option as if no value was provided, without enforcing
/// `required`
///
/// Used to render the default a user would get, e.g. in list displays.
pub fn evaluate_option_default(option: &JobOption) -> Result<String, ErrorList> {
    match &option.option_type {
        OptionType::Bool(cfg) => {
            if cfg.format.is_none() {
                return Err(FieldError::required(
                    "format",
                    "bool option format must be specified",
                )
                .into());
            }
            Ok(cfg.format_value(cfg.default))
        }
        OptionType::String(cfg) => Ok(apply_trim(&cfg.default, cfg.trim_spaces)),
        OptionType::Select(cfg) => Ok(cfg.default.clone()),
        OptionType::Multi(cfg) => Ok(cfg.default.join(&cfg.delimiter)),
        OptionType::Date(_) => Ok(String::new()),
    }
}

fn evaluate_bool(
    value: Option<&Value>,
    _option: &JobOption,
    cfg: &BoolOptionConfig,
    path: &str,
) -> Result<String, ErrorList> {
    match value {
        None => Ok(cfg.format_value(cfg.default)),
        Some(Value::Bool(b)) => Ok(cfg.format_value(*b)),
        Some(other) => Err(FieldError::invalid(path, other, "must be a boolean").into()),
    }
}

fn evaluate_string(
    value: Option<&Value>,
    option: &JobOption,
    cfg: &StringOptionConfig,
    path: &str,
) -> Result<String, ErrorList> {
    let result = match value {
        None => apply_trim(&cfg.default, cfg.trim_spaces),
        Some(Value::String(s)) => apply_trim(s, cfg.trim_spaces),
        Some(other) => {
            return Err(FieldError::invalid(path, other, "must be a string").into());
        }
    };

    if option.required && result.is_empty() {
        return Err(FieldError::required(path, "option is required").into());
    }
    Ok(result)
}

fn evaluate_select(
    value: Option<&Value>,
    option: &JobOption,
    cfg: &SelectOptionConfig,
    path: &str,
) -> Result<String, ErrorList> {
    match value {
        None => {
            if !cfg.default.is_empty() {
                return Ok(cfg.default.clone());
            }
            if option.required {
                return Err(FieldError::required(path, "option is required").into());
            }
            Ok(String::new())
        }
        Some(Value::String(s)) => {
            if s.is_empty() {
                // An explicit empty string clears any default.
                if option.required {
                    return Err(FieldError::required(path, "option is required").into());
                }
                return Ok(String::new());
            }
            if !cfg.allow_custom && !cfg.values.contains(s) {
                return Err(FieldError::invalid(
                    path,
                    s,
                    "must be one of the allowed values",
                )
                .into());
            }
            Ok(s.clone())
        }
        Some(other) => Err(FieldError::invalid(path, other, "must be a string").into()),
    }
}

fn evaluate_multi(
    value: Option<&Value>,
    option: &JobOption,
    cfg: &MultiOptionConfig,
    path: &str,
) -> Result<String, ErrorList> {
    let members = match value {
        None => Vec::new(),
        Some(Value::Array(items)) => {
            let mut members = Vec::with_capacity(items.len());
            let mut errs = ErrorList::new();
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                match item {
                    Value::String(s) if !s.is_empty() => members.push(s.clone()),
                    Value::String(_) => {
                        errs.push(FieldError::invalid(item_path, "", "value cannot be empty"));
                    }
                    other => {
                        errs.push(FieldError::invalid(item_path, other, "must be a string"));
                    }
                }
            }
            if !errs.is_empty() {
                return Err(errs);
            }
            members
        }
        Some(other) => {
            return Err(FieldError::invalid(path, other, "must be a list of strings").into());
        }
    };

    // An empty list falls back to the default, unlike String where an
    // explicit clear sticks.
    if members.is_empty() {
        if !cfg.default.is_empty() {
            return Ok(cfg.default.join(&cfg.delimiter));
        }
        if option.required {
            return Err(FieldError::required(path, "option is required").into());
        }
        return Ok(String::new());
    }

    let mut errs = ErrorList::new();
    for (i, member) in members.iter().enumerate() {
        if !cfg.allow_custom && !cfg.values.contains(member) {
            errs.push(FieldError::invalid(
                format!("{}[{}]", path, i),
                member,
                "must be one of the allowed values",
            ));
        }
    }
    if !errs.is_empty() {
        return Err(errs);
    }

    Ok(members.join(&cfg.delimiter))
}

fn evaluate_date(
    value: Option<&Value>,
    option: &JobOption,
    cfg: &DateOptionConfig,
    path: &str,
) -> Result<String, ErrorList> {
    let Some(value) = value else {
        if option.required {
            return Err(FieldError::required(path, "option is required").into());
        }
        return Ok(String::new());
    };

    let parsed = match value {
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .map_err(|e| FieldError::invalid(path, s, &format!("must be an RFC3339 date: {}", e)))?,
        Value::Number(_) => {
            return Err(FieldError::invalid(
                path,
                value,
                "numeric timestamps are not supported, use an RFC3339 date",
            )
            .into());
        }
        other => {
            return Err(FieldError::invalid(path, other, "must be an RFC3339 date").into());
        }
    };

    if cfg.format.is_empty() {
        return Ok(parsed.to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
    }
    Ok(format_date(&parsed, &cfg.format))
}

fn apply_trim(value: &str, trim: bool) -> String {
    if trim {
        value.trim().to_string()
    } else {
        value.to_string()
    }
}
