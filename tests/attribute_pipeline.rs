//! End-to-end scenario C, invariants 7-8: coercion order and multi-type
//! failure messages, plus presence validation edge cases, observed through
//! the public `call` API.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use taskchain::{call, Attribute, AttributeRegistry, ResultStatus, Task, TaskFailure, TaskInput, TaskInstance};

struct CoercedInputs {
    instance: TaskInstance,
}

#[async_trait]
impl Task for CoercedInputs {
    fn class_name() -> &'static str {
        "CoercedInputs"
    }

    fn attributes() -> AttributeRegistry {
        let mut registry = AttributeRegistry::new();
        registry.register(Attribute::new("first_name").required().with_type("integer"));
        registry.register(Attribute::new("title").with_types(["integer", "float"]));
        registry
    }

    fn new(input: TaskInput, index: usize) -> Self {
        Self {
            instance: TaskInstance::new(Self::class_name(), input.into_context(), index),
        }
    }

    fn instance(&self) -> &TaskInstance {
        &self.instance
    }

    fn instance_mut(&mut self) -> &mut TaskInstance {
        &mut self.instance
    }

    async fn call(&mut self) -> Result<(), TaskFailure> {
        Ok(())
    }
}

fn input(first_name: &str, title: &str) -> TaskInput {
    let mut map = Map::new();
    map.insert("first_name".into(), Value::String(first_name.into()));
    map.insert("title".into(), Value::String(title.into()));
    TaskInput::Map(map)
}

#[tokio::test]
async fn scenario_c_coercion_failure_with_multi_type() {
    let result = call::<CoercedInputs>(input("abc", "abc")).await;
    assert_eq!(result.status, ResultStatus::Failed);

    let messages = result.metadata.get("messages").unwrap();
    let first_name_errors = messages.get("first_name").unwrap().as_array().unwrap();
    assert!(first_name_errors.iter().any(|m| m.as_str() == Some("could not coerce into an integer")));

    let title_errors = messages.get("title").unwrap().as_array().unwrap();
    assert!(title_errors.iter().any(|m| m.as_str() == Some("could not coerce into one of: integer, float")));
}

#[tokio::test]
async fn invariant_8_coercion_order_prefers_first_successful_type() {
    let result = call::<CoercedInputs>(input("7", "3.14")).await;
    assert_eq!(result.outcome(), "success");
}

struct PresenceChecks {
    instance: TaskInstance,
}

#[async_trait]
impl Task for PresenceChecks {
    fn class_name() -> &'static str {
        "PresenceChecks"
    }

    fn attributes() -> AttributeRegistry {
        let mut registry = AttributeRegistry::new();
        registry.register(Attribute::new("value").validate("presence", json!(true)));
        registry
    }

    fn new(input: TaskInput, index: usize) -> Self {
        Self {
            instance: TaskInstance::new(Self::class_name(), input.into_context(), index),
        }
    }

    fn instance(&self) -> &TaskInstance {
        &self.instance
    }

    fn instance_mut(&mut self) -> &mut TaskInstance {
        &mut self.instance
    }

    async fn call(&mut self) -> Result<(), TaskFailure> {
        Ok(())
    }
}

fn with_value(value: Value) -> TaskInput {
    let mut map = Map::new();
    map.insert("value".into(), value);
    TaskInput::Map(map)
}

#[tokio::test]
async fn invariant_7_presence_passes_for_falsy_but_non_blank_values() {
    for value in [json!(0), json!(false), json!("a"), json!(["x"])] {
        let result = call::<PresenceChecks>(with_value(value.clone())).await;
        assert_eq!(result.outcome(), "success", "expected {value:?} to pass presence");
    }
}

#[tokio::test]
async fn invariant_7_presence_fails_for_blank_values() {
    for value in [Value::Null, json!(""), json!("   "), json!([]), json!({})] {
        let result = call::<PresenceChecks>(with_value(value.clone())).await;
        assert_eq!(result.status, ResultStatus::Failed, "expected {value:?} to fail presence");
    }
}

#[tokio::test]
async fn missing_key_also_fails_presence() {
    let result = call::<PresenceChecks>(TaskInput::empty()).await;
    assert_eq!(result.status, ResultStatus::Failed);
}
