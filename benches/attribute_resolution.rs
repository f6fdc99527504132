//! Benchmarks the attribute resolution pipeline (source -> default ->
//! derive -> coerce -> validate), the hot path run once per attribute on
//! every task execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Map, Value};
use taskchain::{Attribute, AttributeHost, AttributeRegistry, Context, TaskInstance};

struct BenchHost(TaskInstance);

impl AttributeHost for BenchHost {
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

fn flat_registry() -> AttributeRegistry {
    let mut registry = AttributeRegistry::new();
    registry
        .register(Attribute::new("first_name").required().with_type("string").validate("presence", json!(true)))
        .register(Attribute::new("age").with_type("integer").validate("numeric", json!({"greater_than_or_equal_to": 0})))
        .register(
            Attribute::new("title")
                .with_types(["integer", "float"])
                .validate("length", json!({"max": 120})),
        );
    registry
}

fn nested_registry() -> AttributeRegistry {
    let mut registry = AttributeRegistry::new();
    registry.register(
        Attribute::new("address")
            .required()
            .with_children([
                Attribute::new("city").required().with_type("string"),
                Attribute::new("zip").with_type("string").validate("format", json!({"with": r"^\d{5}$"})),
            ]),
    );
    registry
}

fn host_with(map: Map<String, Value>) -> BenchHost {
    BenchHost(TaskInstance::new("Bench", Context::from_map(map), 0))
}

fn bench_flat_resolution(c: &mut Criterion) {
    let registry = flat_registry();
    let input = json!({"first_name": "Ada", "age": "41", "title": "3.14"});
    let Value::Object(map) = input else { unreachable!() };

    c.bench_function("flat_attributes/resolve_and_validate", |b| {
        b.iter(|| {
            let mut host = host_with(map.clone());
            registry.define_and_verify(&mut host);
            black_box(host.0.errors.is_empty());
        })
    });
}

fn bench_nested_resolution(c: &mut Criterion) {
    let registry = nested_registry();
    let input = json!({"address": {"city": "Berlin", "zip": "10115"}});
    let Value::Object(map) = input else { unreachable!() };

    c.bench_function("nested_attributes/resolve_and_validate", |b| {
        b.iter(|| {
            let mut host = host_with(map.clone());
            registry.define_and_verify(&mut host);
            black_box(host.0.errors.is_empty());
        })
    });
}

fn bench_coercion_failure_path(c: &mut Criterion) {
    let registry = flat_registry();
    let input = json!({"first_name": "Ada", "age": "not-a-number", "title": "also-not-numeric"});
    let Value::Object(map) = input else { unreachable!() };

    c.bench_function("flat_attributes/coercion_failure_path", |b| {
        b.iter(|| {
            let mut host = host_with(map.clone());
            registry.define_and_verify(&mut host);
            black_box(host.0.errors.is_empty());
        })
    });
}

criterion_group!(benches, bench_flat_resolution, bench_nested_resolution, bench_coercion_failure_path);
criterion_main!(benches);
