//! CallbackRegistry — event-indexed callables with conditional guards,
//! invoked in declaration order (spec §4.8).

use crate::task::AttributeHost;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackEvent {
    BeforeValidation,
    AfterValidation,
    BeforeExecution,
    AfterExecution,
    OnExecuting,
    OnComplete,
    OnInterrupted,
    OnExecuted,
    OnSuccess,
    OnSkipped,
    OnFailed,
    OnGood,
    OnBad,
}

type GuardFn = Arc<dyn Fn(&dyn AttributeHost) -> bool + Send + Sync>;

/// An `if`/`unless` guard evaluated immediately before its callback.
#[derive(Clone)]
pub struct Guard {
    predicate: GuardFn,
    invert: bool,
}

impl Guard {
    pub fn if_true(predicate: impl Fn(&dyn AttributeHost) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
            invert: false,
        }
    }

    pub fn unless(predicate: impl Fn(&dyn AttributeHost) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
            invert: true,
        }
    }

    fn holds(&self, task: &dyn AttributeHost) -> bool {
        let value = (self.predicate)(task);
        if self.invert {
            !value
        } else {
            value
        }
    }
}

type CallbackFn = Arc<dyn Fn(&mut dyn AttributeHost) + Send + Sync>;

#[derive(Clone)]
struct CallbackEntry {
    callback: CallbackFn,
    guards: Vec<Guard>,
}

#[derive(Clone, Default)]
pub struct CallbackRegistry {
    entries: HashMap<CallbackEvent, Vec<CallbackEntry>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        event: CallbackEvent,
        guards: Vec<Guard>,
        callback: impl Fn(&mut dyn AttributeHost) + Send + Sync + 'static,
    ) -> &mut Self {
        self.entries.entry(event).or_default().push(CallbackEntry {
            callback: Arc::new(callback),
            guards,
        });
        self
    }

    /// Un-guarded convenience for the common case.
    pub fn on(
        &mut self,
        event: CallbackEvent,
        callback: impl Fn(&mut dyn AttributeHost) + Send + Sync + 'static,
    ) -> &mut Self {
        self.register(event, Vec::new(), callback)
    }

    /// "Parent classes' callbacks run before subclass callbacks at the
    /// same event" (spec §4.8): `own`'s entries are appended after this
    /// registry's, per event.
    pub fn inherit(&self, own: &CallbackRegistry) -> CallbackRegistry {
        let mut merged = self.clone();
        for (event, entries) in &own.entries {
            merged.entries.entry(*event).or_default().extend(entries.iter().cloned());
        }
        merged
    }

    pub fn invoke(&self, event: CallbackEvent, task: &mut dyn AttributeHost) {
        let Some(entries) = self.entries.get(&event) else {
            return;
        };
        for entry in entries.clone() {
            if entry.guards.iter().all(|guard| guard.holds(&*task)) {
                (entry.callback)(task);
            }
        }
    }
}
