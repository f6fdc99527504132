//! Attribute — a declared input or derived value with coercion and
//! validation (spec §3 "Attribute", §9 design note on dynamic `source`
//! dispatch).

pub mod registry;
pub mod value;

pub use registry::AttributeRegistry;
pub use value::resolve;

use crate::task::TaskInstance;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Tagged union standing in for the source language's "symbol, arity-1
/// callable, zero-arity block, or literal" dispatch (§9 design note:
/// "no reflection needed").
#[derive(Clone)]
pub enum Source {
    /// Pull straight from the task's `Context` (the default).
    Context,
    /// A named method the owning `Task` registers via
    /// `Task::source_methods()`, looked up by name at resolution time.
    Named(String),
    /// An arity-1 callable or zero-arity block; always invoked with the
    /// task instance so both source shapes collapse to one signature.
    Callable(Arc<dyn Fn(&TaskInstance) -> Option<Value> + Send + Sync>),
    /// A literal container — treated as the source value directly.
    Literal(Value),
}

impl Default for Source {
    fn default() -> Self {
        Source::Context
    }
}

/// A literal default, a named task method, or an arity-1/zero-arity
/// callable — same shape as `Source` minus the "read from context" case,
/// since a default has no container to read from.
#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Named(String),
    Callable(Arc<dyn Fn(&TaskInstance) -> Value + Send + Sync>),
}

#[derive(Clone, Default)]
pub struct AttributeOptions {
    pub default: Option<DefaultValue>,
    pub source: Source,
    pub required: bool,
    /// `as`: renames the generated accessor.
    pub as_name: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Validator-key -> option value, e.g. `"presence" -> true`,
    /// `"length" -> {"min": 1}`.
    pub validations: BTreeMap<String, Value>,
}

#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    /// Ordered coercion ids to try, first success wins. Empty means "no
    /// coercion, use the derived value unchanged".
    pub types: Vec<String>,
    pub options: AttributeOptions,
    pub children: Vec<Attribute>,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
            options: AttributeOptions::default(),
            children: Vec::new(),
        }
    }

    pub fn with_type(mut self, type_id: impl Into<String>) -> Self {
        self.types.push(type_id.into());
        self
    }

    pub fn with_types(mut self, type_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.types.extend(type_ids.into_iter().map(Into::into));
        self
    }

    pub fn required(mut self) -> Self {
        self.options.required = true;
        self
    }

    pub fn default_value(mut self, default: DefaultValue) -> Self {
        self.options.default = Some(default);
        self
    }

    pub fn source(mut self, source: Source) -> Self {
        self.options.source = source;
        self
    }

    pub fn as_name(mut self, name: impl Into<String>) -> Self {
        self.options.as_name = Some(name.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.prefix = Some(prefix.into());
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.options.suffix = Some(suffix.into());
        self
    }

    pub fn validate(mut self, key: impl Into<String>, opts: impl Into<Value>) -> Self {
        self.options.validations.insert(key.into(), opts.into());
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Attribute>) -> Self {
        self.children.extend(children);
        self
    }

    /// `methodName` (spec §3): `(prefix ?? "") + (as ?? name) + (suffix ?? "")`.
    pub fn method_name(&self) -> String {
        let base = self.options.as_name.as_deref().unwrap_or(&self.name);
        format!(
            "{}{}{}",
            self.options.prefix.as_deref().unwrap_or(""),
            base,
            self.options.suffix.as_deref().unwrap_or(""),
        )
    }
}

/// Per-attribute message map with aggregated rendering (spec §3 "Errors").
#[derive(Debug, Clone, Default)]
pub struct Errors {
    messages: BTreeMap<String, Vec<String>>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.messages.entry(key.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn for_key(&self, key: &str) -> &[String] {
        self.messages.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// One message per error, `"<key> <message>"`, joined with `. `.
    pub fn full_messages(&self) -> String {
        self.messages
            .iter()
            .flat_map(|(key, msgs)| msgs.iter().map(move |m| format!("{key} {m}")))
            .collect::<Vec<_>>()
            .join(". ")
    }

    pub fn as_map(&self) -> Map<String, Value> {
        self.messages
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    Value::Array(v.iter().cloned().map(Value::String).collect()),
                )
            })
            .collect()
    }
}
