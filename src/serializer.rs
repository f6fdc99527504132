//! Serializers and human-readable inspectors for Task/Result/Chain (spec
//! §4.14).
//!
//! `TaskInstance` carries `id`/`chain_id`/tags that a bare `Arc<TaskResult>`
//! does not (the Chain's log stores only the lightweight, immutable
//! `TaskResult` snapshot — see `chain.rs`). So a top-level `serialize_result`
//! call gets the full shape, but the `caused_failure`/`threw_failure`
//! pointers embedded inside it, and every entry in a `ChainSerializer`'s
//! `results` list, fall back to [`serialize_result_bare`] — `index`,
//! `class`, `state`, `status`, `outcome`, `metadata`, `runtime` only. This
//! is the "stripped one level" the spec calls for, just forced one level
//! higher than the spec's own wording by what the data model retains.

use crate::chain::Chain;
use crate::result::TaskResult;
use crate::task::TaskInstance;
use serde_json::{Map, Value};

/// `TaskSerializer(task)` (spec §4.14).
pub fn serialize_task(instance: &TaskInstance, kind: &'static str, tags: &[String]) -> Map<String, Value> {
    let chain_id = instance
        .chain
        .as_ref()
        .map(|chain| chain.lock().expect("chain mutex poisoned").id.clone())
        .unwrap_or_default();

    let mut map = Map::new();
    map.insert("index".into(), Value::from(instance.result.index));
    map.insert("chain_id".into(), Value::String(chain_id));
    map.insert("type".into(), Value::String(kind.to_string()));
    map.insert("class".into(), Value::String(instance.class_name.to_string()));
    map.insert("id".into(), Value::String(instance.id.to_string()));
    map.insert(
        "tags".into(),
        Value::Array(tags.iter().cloned().map(Value::String).collect()),
    );
    map
}

/// `ResultSerializer(result)` (spec §4.14): `TaskSerializer ⊕
/// {state, status, outcome, metadata, runtime}`, plus `caused_failure`/
/// `threw_failure` when those pointers exist and don't just point back to
/// this same result (the locally-caused-failure case never populates
/// `caused_failure` in the first place — see `result.rs`).
pub fn serialize_result(instance: &TaskInstance, kind: &'static str, tags: &[String]) -> Map<String, Value> {
    let mut map = serialize_task(instance, kind, tags);
    extend_with_result_fields(&mut map, &instance.result);

    if let Some(caused) = instance.result.caused_failure_result() {
        map.insert("caused_failure".into(), Value::Object(serialize_result_bare(caused)));
    }
    if let Some(threw) = instance.result.threw_failure_result() {
        map.insert("threw_failure".into(), Value::Object(serialize_result_bare(threw)));
    }
    map
}

/// Bare `{index, class, state, status, outcome, metadata, runtime}` — used
/// wherever only an `Arc<TaskResult>` (not its owning `TaskInstance`) is
/// available: failure pointers and chain entries.
pub fn serialize_result_bare(result: &TaskResult) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("index".into(), Value::from(result.index));
    map.insert("class".into(), Value::String(result.class_name.clone()));
    extend_with_result_fields(&mut map, result);
    map
}

fn extend_with_result_fields(map: &mut Map<String, Value>, result: &TaskResult) {
    map.insert("state".into(), Value::String(result.state.to_string()));
    map.insert("status".into(), Value::String(result.status.to_string()));
    map.insert("outcome".into(), Value::String(result.outcome()));
    map.insert("metadata".into(), Value::Object(result.metadata.clone()));
    map.insert(
        "runtime".into(),
        result.runtime.map(Value::from).unwrap_or(Value::Null),
    );
}

/// `ChainSerializer(chain)` (spec §4.14): chain-level state/status/outcome/
/// runtime delegate to the first Result.
pub fn serialize_chain(chain: &Chain) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("id".into(), Value::String(chain.id.clone()));

    let (state, status, outcome, runtime) = match chain.first() {
        Some(first) => (
            Value::String(first.state.to_string()),
            Value::String(first.status.to_string()),
            Value::String(first.outcome()),
            first.runtime.map(Value::from).unwrap_or(Value::Null),
        ),
        None => (Value::Null, Value::Null, Value::Null, Value::Null),
    };
    map.insert("state".into(), state);
    map.insert("status".into(), status);
    map.insert("outcome".into(), outcome);
    map.insert("runtime".into(), runtime);
    map.insert(
        "results".into(),
        Value::Array(chain.results().iter().map(|r| Value::Object(serialize_result_bare(r))).collect()),
    );
    map
}

fn result_line(result: &TaskResult) -> String {
    format!(
        "{}) {} [{}] outcome={} runtime={}",
        result.index,
        result.class_name,
        result.state,
        result.outcome(),
        result
            .runtime
            .map(|r| format!("{r:.6}"))
            .unwrap_or_else(|| "nil".to_string()),
    )
}

/// Human-readable multi-line block for one `Result` (spec §4.14): header,
/// `=`-separator, the result line, separator again, labeled footer.
pub fn inspect_result(result: &TaskResult) -> String {
    let header = format!("result: {}", result.class_name);
    let footer = format!(
        "state: {} | status: {} | outcome: {} | runtime: {}",
        result.state,
        result.status,
        result.outcome(),
        result.runtime.map(|r| format!("{r:.6}")).unwrap_or_else(|| "nil".to_string()),
    );
    let width = header.len().max(footer.len());
    let separator = "=".repeat(width);
    format!("\n{header}\n{separator}\n{}\n{separator}\n{footer}\n", result_line(result))
}

/// Same shape for a whole `Chain`: one line per `Result` in the body.
pub fn inspect_chain(chain: &Chain) -> String {
    let header = format!("chain: {}", chain.id);
    let (state, status, outcome, runtime) = match chain.first() {
        Some(first) => (
            first.state.to_string(),
            first.status.to_string(),
            first.outcome(),
            first.runtime.map(|r| format!("{r:.6}")).unwrap_or_else(|| "nil".to_string()),
        ),
        None => ("nil".into(), "nil".into(), "nil".into(), "nil".into()),
    };
    let footer = format!("state: {state} | status: {status} | outcome: {outcome} | runtime: {runtime}");
    let width = header.len().max(footer.len());
    let separator = "=".repeat(width);

    let body = chain
        .results()
        .iter()
        .map(|r| result_line(r))
        .collect::<Vec<_>>()
        .join("\n");

    format!("\n{header}\n{separator}\n{body}\n{separator}\n{footer}\n")
}
