//! AttributeRegistry — ordered collection of top-level `Attribute`s; walks
//! the tree to resolve values into a task's cache (spec §4.7).

use super::{value, Attribute};
use crate::task::AttributeHost;
use serde_json::Value;

#[derive(Clone, Default)]
pub struct AttributeRegistry {
    attributes: Vec<Attribute>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, attribute: Attribute) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    pub fn register_all(&mut self, attributes: impl IntoIterator<Item = Attribute>) -> &mut Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Merges `other`'s attributes after this registry's own — the
    /// "subclass initialization copies parent's list, then appends own
    /// entries" strategy from spec §9.
    pub fn inherit(&self, own: &AttributeRegistry) -> AttributeRegistry {
        let mut merged = self.clone();
        merged.attributes.extend(own.attributes.iter().cloned());
        merged
    }

    /// `defineAndVerify(task)`: resolves every attribute (and its nested
    /// children) into the task's attribute cache, recording errors along
    /// the way (spec §4.4, §4.7), then runs validation over the whole tree
    /// once every value has been generated (spec §4.4 "Validation runs
    /// separately after the whole registry has generated values").
    pub fn define_and_verify(&self, task: &mut dyn AttributeHost) {
        for attribute in &self.attributes {
            resolve_recursive(attribute, None, task);
        }
        for attribute in &self.attributes {
            validate_recursive(attribute, task);
        }
    }

    /// Removes attributes whose own method name or any descendant's
    /// method name is in `names`.
    pub fn deregister(&mut self, names: &[&str]) {
        self.attributes.retain(|a| !matches_name_or_descendant(a, names));
    }
}

fn resolve_recursive(attribute: &Attribute, parent: Option<&Attribute>, task: &mut dyn AttributeHost) {
    value::resolve(attribute, parent, task);
    for child in &attribute.children {
        resolve_recursive(child, Some(attribute), task);
    }
}

fn validate_recursive(attribute: &Attribute, task: &mut dyn AttributeHost) {
    validate_one(attribute, task);
    for child in &attribute.children {
        validate_recursive(child, task);
    }
}

/// Runs every registered validator key present in `attribute.options.validations`
/// against the already-resolved value (spec §4.5). A validator not present in
/// the default registry is simply never invoked: `ValidatorRegistry::validate`
/// returns `None` for unknown keys rather than erroring.
fn validate_one(attribute: &Attribute, task: &mut dyn AttributeHost) {
    if attribute.options.validations.is_empty() {
        return;
    }
    let method_name = attribute.method_name();
    let value = task
        .instance()
        .cache
        .get(&method_name)
        .cloned()
        .unwrap_or(Value::Null);

    let registry = crate::validation::default_registry();
    for (key, opts) in &attribute.options.validations {
        if let Some(Err(e)) = registry.validate(key, task, &value, opts) {
            task.instance_mut().errors.add(method_name.clone(), e.to_string());
        }
    }
}

fn matches_name_or_descendant(attribute: &Attribute, names: &[&str]) -> bool {
    if names.contains(&attribute.method_name().as_str()) {
        return true;
    }
    attribute
        .children
        .iter()
        .any(|child| matches_name_or_descendant(child, names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Attribute;
    use crate::context::Context;
    use crate::task::TaskInstance;

    struct Dummy(TaskInstance);
    impl AttributeHost for Dummy {
        fn instance(&self) -> &TaskInstance {
            &self.0
        }
        fn instance_mut(&mut self) -> &mut TaskInstance {
            &mut self.0
        }
        fn resolve_method(&self, _name: &str) -> Option<Value> {
            None
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    #[test]
    fn define_and_verify_runs_presence_validator_after_resolution() {
        let mut registry = AttributeRegistry::new();
        registry.register(Attribute::new("title").validate("presence", serde_json::json!(true)));

        let mut dummy = Dummy(TaskInstance::new("T", Context::new(), 0));
        registry.define_and_verify(&mut dummy);

        assert_eq!(dummy.0.errors.for_key("title"), ["is a required parameter"]);
    }

    #[test]
    fn define_and_verify_passes_validation_when_value_present() {
        let mut registry = AttributeRegistry::new();
        registry.register(
            Attribute::new("title")
                .source(crate::attribute::Source::Literal(serde_json::json!({"title": "ok"})))
                .validate("presence", serde_json::json!(true)),
        );

        let mut dummy = Dummy(TaskInstance::new("T", Context::new(), 0));
        registry.define_and_verify(&mut dummy);

        assert!(dummy.0.errors.for_key("title").is_empty());
    }

    #[test]
    fn child_attribute_resolves_against_parents_nested_value() {
        let mut registry = AttributeRegistry::new();
        registry.register(
            Attribute::new("address").with_children([Attribute::new("city").required()]),
        );

        let context = Context::new();
        context.set("address", serde_json::json!({"city": "NYC"}));
        let mut dummy = Dummy(TaskInstance::new("T", context, 0));
        registry.define_and_verify(&mut dummy);

        assert!(dummy.0.errors.for_key("city").is_empty());
        assert_eq!(dummy.0.cache.get("city"), Some(&serde_json::json!("NYC")));
    }

    #[test]
    fn deregister_removes_own_and_descendant_matches() {
        let mut registry = AttributeRegistry::new();
        registry.register(
            Attribute::new("address").with_children([Attribute::new("city")]),
        );
        registry.register(Attribute::new("name"));

        registry.deregister(&["city"]);
        assert_eq!(registry.attributes().len(), 1);
        assert_eq!(registry.attributes()[0].name, "name");
    }

    #[test]
    fn inherit_puts_parent_attributes_before_own() {
        let mut parent = AttributeRegistry::new();
        parent.register(Attribute::new("parent_attr"));
        let mut own = AttributeRegistry::new();
        own.register(Attribute::new("own_attr"));

        let merged = parent.inherit(&own);
        let names: Vec<_> = merged.attributes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["parent_attr", "own_attr"]);
    }
}
