//! The `sourceValue -> defaultValue -> deriveValue -> coerceValue`
//! resolution pipeline for a single `(Task, Attribute)` pair (spec §4.4).

use super::{Attribute, DefaultValue, Source};
use crate::task::AttributeHost;
use serde_json::Value;

/// Resolves `attribute` against `task` and stores the final value in the
/// task's attribute cache under its method name. Short-circuits if an
/// error has already been recorded against that method name by an earlier
/// sibling/ancestor resolution.
pub fn resolve(attribute: &Attribute, parent: Option<&Attribute>, task: &mut dyn AttributeHost) {
    let method_name = attribute.method_name();
    if !task.instance().errors.for_key(&method_name).is_empty() {
        return;
    }

    let source = source_value(attribute, parent, task);
    let default = default_value(attribute, task);
    let derived = derive_value(attribute, &source, &default, task);
    let coerced = coerce_value(attribute, derived, task);

    task.instance_mut().cache.insert(method_name, coerced);
}

fn source_value(attribute: &Attribute, parent: Option<&Attribute>, task: &mut dyn AttributeHost) -> Value {
    let method_name = attribute.method_name();

    // "If the parent attribute is required, the same containment check is
    // applied to the parent first" (spec §4.4 step 1).
    if let Some(parent) = parent {
        if parent.options.required && !contains_in_source(parent, None, task) {
            task.instance_mut()
                .errors
                .add(parent.method_name(), "is a required parameter");
        }
    }

    let value = match &attribute.options.source {
        // "methodSource = explicit source option, else parent's method
        // name, else context" (spec.md:64) — a child with no explicit
        // source resolves against its parent's already-resolved cache
        // value, not the task's top-level Context.
        Source::Context => match parent {
            Some(parent) => task.instance().cache.get(&parent.method_name()).cloned().unwrap_or(Value::Null),
            None => Value::Object(task.instance().context.as_map()),
        },
        Source::Literal(value) => value.clone(),
        Source::Named(name) => match task.resolve_method(name) {
            Some(value) => value,
            None => {
                task.instance_mut()
                    .errors
                    .add(&method_name, format!("delegates to undefined method {name}"));
                Value::Null
            }
        },
        Source::Callable(resolver) => resolver(task.instance()).unwrap_or(Value::Null),
    };

    if attribute.options.required && !contains_in_source(attribute, parent, task) {
        task.instance_mut()
            .errors
            .add(&method_name, "is a required parameter");
    }

    value
}

/// "Proc sources bypass this check" (spec §4.4) — an arity-1 callable has
/// no container to check membership against, so it always passes. A
/// `Source::Context` attribute nested under `parent` checks membership in
/// the parent's already-resolved cache value instead of the task's
/// Context, mirroring `source_value`'s own resolution above.
fn contains_in_source(attribute: &Attribute, parent: Option<&Attribute>, task: &dyn AttributeHost) -> bool {
    match &attribute.options.source {
        Source::Context => match parent {
            Some(parent) => matches!(
                task.instance().cache.get(&parent.method_name()),
                Some(Value::Object(map)) if map.contains_key(&attribute.name)
            ),
            None => task.instance().context.contains(&attribute.name),
        },
        Source::Literal(Value::Object(map)) => map.contains_key(&attribute.name),
        Source::Literal(_) => false,
        Source::Named(name) => task.resolve_method(name).is_some(),
        Source::Callable(_) => true,
    }
}

fn default_value(attribute: &Attribute, task: &mut dyn AttributeHost) -> Option<Value> {
    match &attribute.options.default {
        None => None,
        Some(DefaultValue::Literal(value)) => Some(value.clone()),
        Some(DefaultValue::Named(name)) => task.resolve_method(name),
        Some(DefaultValue::Callable(resolver)) => Some(resolver(task.instance())),
    }
}

fn derive_value(
    attribute: &Attribute,
    source: &Value,
    default: &Option<Value>,
    task: &mut dyn AttributeHost,
) -> Value {
    let derived = match source {
        Value::Object(map) => map.get(&attribute.name).cloned(),
        Value::Null => None,
        // A non-container source is treated as "an object responding to
        // the attribute's method name": dispatched through the same named
        // lookup `Source::Named` uses, since Rust has no reflection.
        _ => task.resolve_method(&attribute.method_name()),
    };

    match derived {
        None | Some(Value::Null) => default.clone().unwrap_or(Value::Null),
        Some(value) => value,
    }
}

fn coerce_value(attribute: &Attribute, value: Value, task: &mut dyn AttributeHost) -> Value {
    if attribute.types.is_empty() {
        return value;
    }

    let registry = crate::coercion::default_registry();
    for type_id in &attribute.types {
        if let Ok(coerced) = registry.coerce(type_id, task.instance(), &value, attribute) {
            return coerced;
        }
    }

    let method_name = attribute.method_name();
    let message = if attribute.types.len() == 1 {
        format!("could not coerce into {}", with_article(&attribute.types[0]))
    } else {
        format!("could not coerce into one of: {}", attribute.types.join(", "))
    };
    task.instance_mut().errors.add(method_name, message);
    Value::Null
}

fn with_article(type_name: &str) -> String {
    let starts_with_vowel = type_name
        .chars()
        .next()
        .map(|c| matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u'))
        .unwrap_or(false);
    format!("{} {type_name}", if starts_with_vowel { "an" } else { "a" })
}
