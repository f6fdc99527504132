//! CoercionRegistry — named type converters, tried in declaration order
//! until one succeeds (spec §4.6). Concrete coercion functions are
//! deliberately simple: the spec places "the concrete coercion/validator
//! functions" out of scope and asks only that the registry contract hold.

use crate::attribute::Attribute;
use crate::error::{CmdxError, CoercionError, UnknownCoercionError};
use crate::task::TaskInstance;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub type Coercion =
    Arc<dyn Fn(&TaskInstance, &Value, &Attribute) -> Result<Value, CoercionError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct CoercionRegistry {
    coercions: HashMap<String, Coercion>,
}

impl CoercionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, key: impl Into<String>, coercion: F) -> &mut Self
    where
        F: Fn(&TaskInstance, &Value, &Attribute) -> Result<Value, CoercionError> + Send + Sync + 'static,
    {
        self.coercions.insert(key.into(), Arc::new(coercion));
        self
    }

    pub fn keys(&self) -> Vec<&str> {
        self.coercions.keys().map(String::as_str).collect()
    }

    /// An unrecognized `key` is a distinct failure from a recognized
    /// coercion rejecting the value (spec §7: `CoercionError` vs
    /// `UnknownCoercionError`) — the former never reaches a registered
    /// coercion fn, so it can't be mistaken for one of its rejections.
    pub fn coerce(
        &self,
        key: &str,
        instance: &TaskInstance,
        value: &Value,
        attribute: &Attribute,
    ) -> Result<Value, CmdxError> {
        match self.coercions.get(key) {
            Some(coercion) => coercion(instance, value, attribute).map_err(CmdxError::from),
            None => Err(CmdxError::from(UnknownCoercionError(key.to_string()))),
        }
    }
}

/// The default registry (spec §4.6 "Default registrations"). Built once
/// and shared, matching how the source's class-level registry is a single
/// process-wide table.
pub fn default_registry() -> &'static CoercionRegistry {
    static REGISTRY: OnceCell<CoercionRegistry> = OnceCell::new();
    REGISTRY.get_or_init(build_default_registry)
}

fn build_default_registry() -> CoercionRegistry {
    let mut registry = CoercionRegistry::new();
    registry.register("integer", |_, v, _| coerce_integer(v));
    registry.register("float", |_, v, _| coerce_float(v));
    registry.register("string", |_, v, _| coerce_string(v));
    registry.register("boolean", |_, v, _| coerce_boolean(v));
    registry.register("array", |_, v, _| coerce_array(v));
    registry.register("hash", |_, v, _| coerce_hash(v));
    registry.register("big_decimal", |_, v, _| coerce_decimal_like(v, "big_decimal"));
    registry.register("rational", |_, v, _| coerce_decimal_like(v, "rational"));
    registry.register("complex", |_, v, _| coerce_complex(v));
    registry.register("date", |_, v, _| coerce_temporal(v, &date_re()));
    registry.register("datetime", |_, v, _| coerce_temporal(v, &datetime_re()));
    registry.register("time", |_, v, _| coerce_temporal(v, &datetime_re()));
    registry.register("virtual", |_, v, _| Ok(v.clone()));
    registry
}

fn coerce_integer(value: &Value) -> Result<Value, CoercionError> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| Value::Number(Number::from(f as i64)))
            .ok_or_else(|| CoercionError::new("integer", "has a fractional part")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(|n| Value::Number(Number::from(n)))
            .map_err(|_| CoercionError::new("integer", format!("{s:?} is not an integer"))),
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => {
            Err(CoercionError::new("integer", "not coercible"))
        }
    }
}

fn coerce_float(value: &Value) -> Result<Value, CoercionError> {
    match value {
        Value::Number(n) => Number::from_f64(n.as_f64().unwrap_or(f64::NAN))
            .map(Value::Number)
            .ok_or_else(|| CoercionError::new("float", "not a finite number")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| CoercionError::new("float", format!("{s:?} is not a float"))),
        _ => Err(CoercionError::new("float", "not coercible")),
    }
}

fn coerce_string(value: &Value) -> Result<Value, CoercionError> {
    match value {
        Value::Null => Err(CoercionError::new("string", "cannot coerce null")),
        Value::String(s) => Ok(Value::String(s.clone())),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        Value::Array(_) | Value::Object(_) => Err(CoercionError::new("string", "not a scalar")),
    }
}

fn coerce_boolean(value: &Value) -> Result<Value, CoercionError> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Value::Bool(true)),
            "false" | "0" | "no" => Ok(Value::Bool(false)),
            _ => Err(CoercionError::new("boolean", format!("{s:?} is not a boolean"))),
        },
        Value::Number(n) if n.as_i64() == Some(0) => Ok(Value::Bool(false)),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(Value::Bool(true)),
        _ => Err(CoercionError::new("boolean", "not coercible")),
    }
}

fn coerce_array(value: &Value) -> Result<Value, CoercionError> {
    match value {
        Value::Array(_) => Ok(value.clone()),
        Value::Null => Ok(Value::Array(Vec::new())),
        other => Ok(Value::Array(vec![other.clone()])),
    }
}

fn coerce_hash(value: &Value) -> Result<Value, CoercionError> {
    match value {
        Value::Object(_) => Ok(value.clone()),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(CoercionError::new("hash", "not a mapping")),
    }
}

/// `big_decimal`/`rational` have no lossless `serde_json` representation;
/// both are coerced to a tagged object carrying the original decimal text
/// so precision survives round-tripping through `Context`.
fn coerce_decimal_like(value: &Value, type_name: &'static str) -> Result<Value, CoercionError> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(CoercionError::new(type_name, "not coercible")),
    };
    if text.parse::<f64>().is_err() {
        return Err(CoercionError::new(type_name, format!("{text:?} is not numeric")));
    }
    let mut tagged = Map::new();
    tagged.insert("type".into(), Value::String(type_name.into()));
    tagged.insert("value".into(), Value::String(text));
    Ok(Value::Object(tagged))
}

fn coerce_complex(value: &Value) -> Result<Value, CoercionError> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(CoercionError::new("complex", "not coercible")),
    };
    let mut tagged = Map::new();
    tagged.insert("type".into(), Value::String("complex".into()));
    tagged.insert("value".into(), Value::String(text));
    Ok(Value::Object(tagged))
}

fn date_re() -> Regex {
    Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static regex")
}

fn datetime_re() -> Regex {
    Regex::new(r"^\d{4}-\d{2}-\d{2}([T ]\d{2}:\d{2}:\d{2})?(Z|[+-]\d{2}:?\d{2})?$")
        .expect("static regex")
}

fn coerce_temporal(value: &Value, pattern: &Regex) -> Result<Value, CoercionError> {
    match value {
        Value::String(s) if pattern.is_match(s.trim()) => Ok(Value::String(s.trim().to_string())),
        Value::String(s) => Err(CoercionError::new("date/time", format!("{s:?} does not match the expected format"))),
        _ => Err(CoercionError::new("date/time", "not a string")),
    }
}
