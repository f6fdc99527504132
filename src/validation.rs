//! ValidatorRegistry — named validators applied per attribute-option key
//! (spec §4.5, §4.6).

use crate::error::ValidationError;
use crate::task::AttributeHost;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub type Validator =
    Arc<dyn Fn(&dyn AttributeHost, &Value, &Value) -> Result<(), ValidationError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Validator>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, key: impl Into<String>, validator: F) -> &mut Self
    where
        F: Fn(&dyn AttributeHost, &Value, &Value) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validators.insert(key.into(), Arc::new(validator));
        self
    }

    pub fn keys(&self) -> Vec<&str> {
        self.validators.keys().map(String::as_str).collect()
    }

    /// `validate(task, value, optionValue)` — `None` when `key` isn't
    /// registered, matching "iterate registered validator keys" (spec
    /// §4.5): unknown keys in an attribute's options are simply not
    /// validator invocations.
    pub fn validate(
        &self,
        key: &str,
        task: &dyn AttributeHost,
        value: &Value,
        option_value: &Value,
    ) -> Option<Result<(), ValidationError>> {
        self.validators
            .get(key)
            .map(|validator| validator(task, value, option_value))
    }
}

pub fn default_registry() -> &'static ValidatorRegistry {
    static REGISTRY: OnceCell<ValidatorRegistry> = OnceCell::new();
    REGISTRY.get_or_init(build_default_registry)
}

fn build_default_registry() -> ValidatorRegistry {
    let mut registry = ValidatorRegistry::new();
    registry.register("presence", |_, value, opts| validate_presence(value, opts));
    registry.register("format", |_, value, opts| validate_format(value, opts));
    registry.register("inclusion", |_, value, opts| validate_inclusion(value, opts));
    registry.register("exclusion", |_, value, opts| validate_exclusion(value, opts));
    registry.register("length", |_, value, opts| validate_length(value, opts));
    registry.register("numeric", |_, value, opts| validate_numeric(value, opts));
    registry
}

/// Skip hook shared by every validator: `allow_nil: true` and a null value
/// is always accepted (spec §4.5 "skipping is the validator's
/// responsibility").
fn allow_nil_skip(value: &Value, opts: &Value) -> bool {
    value.is_null() && opts.get("allow_nil").and_then(Value::as_bool).unwrap_or(false)
}

/// `presence` (spec §4.6, "representative, must be implemented exactly").
fn validate_presence(value: &Value, opts: &Value) -> Result<(), ValidationError> {
    if allow_nil_skip(value, opts) {
        return Ok(());
    }
    let blank = match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    };
    if blank {
        Err(ValidationError::new("is a required parameter"))
    } else {
        Ok(())
    }
}

/// `opts: {"with": "<pattern>"}`.
fn validate_format(value: &Value, opts: &Value) -> Result<(), ValidationError> {
    if allow_nil_skip(value, opts) {
        return Ok(());
    }
    let pattern = opts
        .get("with")
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::new("format validator requires a \"with\" pattern"))?;
    let regex = Regex::new(pattern).map_err(|e| ValidationError::new(format!("invalid format pattern: {e}")))?;
    match value.as_str() {
        Some(s) if regex.is_match(s) => Ok(()),
        _ => Err(ValidationError::new("is invalid")),
    }
}

/// `opts: {"in": [...]}`.
fn validate_inclusion(value: &Value, opts: &Value) -> Result<(), ValidationError> {
    let allowed = opts
        .get("in")
        .and_then(Value::as_array)
        .ok_or_else(|| ValidationError::new("inclusion validator requires an \"in\" list"))?;
    if allowed.contains(value) {
        Ok(())
    } else {
        Err(ValidationError::new("is not included in the list"))
    }
}

fn validate_exclusion(value: &Value, opts: &Value) -> Result<(), ValidationError> {
    let disallowed = opts
        .get("in")
        .and_then(Value::as_array)
        .ok_or_else(|| ValidationError::new("exclusion validator requires an \"in\" list"))?;
    if disallowed.contains(value) {
        Err(ValidationError::new("is reserved"))
    } else {
        Ok(())
    }
}

/// `opts: {"min":, "max":, "is":}`, measured on strings and arrays.
fn validate_length(value: &Value, opts: &Value) -> Result<(), ValidationError> {
    if allow_nil_skip(value, opts) {
        return Ok(());
    }
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        _ => return Err(ValidationError::new("does not respond to length")),
    };
    if let Some(exact) = opts.get("is").and_then(Value::as_u64) {
        if len as u64 != exact {
            return Err(ValidationError::new(format!("is the wrong length (should be {exact})")));
        }
    }
    if let Some(min) = opts.get("min").and_then(Value::as_u64) {
        if (len as u64) < min {
            return Err(ValidationError::new(format!("is too short (minimum is {min})")));
        }
    }
    if let Some(max) = opts.get("max").and_then(Value::as_u64) {
        if (len as u64) > max {
            return Err(ValidationError::new(format!("is too long (maximum is {max})")));
        }
    }
    Ok(())
}

/// `opts: {"greater_than":, "less_than":, "greater_than_or_equal_to":,
/// "less_than_or_equal_to":, "equal_to":}`.
fn validate_numeric(value: &Value, opts: &Value) -> Result<(), ValidationError> {
    if allow_nil_skip(value, opts) {
        return Ok(());
    }
    let n = value
        .as_f64()
        .ok_or_else(|| ValidationError::new("is not a number"))?;

    let check = |key: &str, op: fn(f64, f64) -> bool, message: &str| -> Result<(), ValidationError> {
        match opts.get(key).and_then(Value::as_f64) {
            Some(bound) if !op(n, bound) => Err(ValidationError::new(format!("must be {message} {bound}"))),
            _ => Ok(()),
        }
    };

    check("greater_than", |a, b| a > b, "greater than")?;
    check("less_than", |a, b| a < b, "less than")?;
    check("greater_than_or_equal_to", |a, b| a >= b, "greater than or equal to")?;
    check("less_than_or_equal_to", |a, b| a <= b, "less than or equal to")?;
    check("equal_to", |a, b| a == b, "equal to")?;
    Ok(())
}
