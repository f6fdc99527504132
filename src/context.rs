//! Context — the shared mutable property bag carried between tasks in one
//! execution (spec §3 "Context").
//!
//! Backed by `serde_json::Map` with the `preserve_order` feature so
//! insertion order survives (the source's requirement of an "ordered
//! mapping"), and `serde_json::Value` as the dynamic "any" payload type —
//! the same representation `nika`'s `GlobalContext`/`TaskContext` use for
//! task inputs and outputs.

use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};

/// Cheaply cloneable: every task sharing one execution holds the same
/// underlying map via `Arc`, matching "Context is shared by all tasks ...
/// until frozen" (spec §5).
#[derive(Debug, Clone, Default)]
pub struct Context {
    inner: Arc<RwLock<Map<String, Value>>>,
    frozen: Arc<std::sync::atomic::AtomicBool>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(map)),
            frozen: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Reuses the same backing store — the "child task invoked with the
    /// same input" case in spec §3.
    pub fn share(&self) -> Self {
        self.clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().expect("context lock poisoned").get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().expect("context lock poisoned").contains_key(key)
    }

    /// Returns `false` (and leaves the context untouched) once frozen.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        if self.is_frozen() {
            return false;
        }
        self.inner
            .write()
            .expect("context lock poisoned")
            .insert(key.into(), value.into());
        true
    }

    pub fn as_map(&self) -> Map<String, Value> {
        self.inner.read().expect("context lock poisoned").clone()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(std::sync::atomic::Ordering::Acquire)
    }

    /// Permanently blocks further mutation (spec §4.11 step 7).
    pub fn freeze(&self) {
        self.frozen.store(true, std::sync::atomic::Ordering::Release);
    }
}
