//! Task — user-authored unit of work; holds id/context/result/chain and
//! orchestrates its own lifecycle through the [`crate::executor`] run loop
//! (spec §3 "Task", §4.10).

use crate::attribute::{AttributeRegistry, Errors};
use crate::callback::CallbackRegistry;
use crate::chain::Chain;
use crate::context::Context;
use crate::fault::TaskFailure;
use crate::middleware::MiddlewareRegistry;
use crate::result::{ResultStatus, TaskResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// `deprecated:` setting (spec §6 "Environment variables" / `cmd_settings!`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deprecation {
    #[default]
    None,
    /// Warn via the task's logger at instantiation time.
    Log,
    /// Raise `DeprecationError` at instantiation time.
    Raise,
    /// Issue a process-level deprecation warning (best-effort: logged once).
    Warn,
}

/// Per-class settings, merged down the inheritance chain in the source;
/// here each `Task` impl builds its own by overriding [`Task::settings`]
/// (spec §4.10 `cmd_settings!`).
#[derive(Debug, Clone)]
pub struct TaskSettings {
    /// Statuses that cause `call_bang` to re-raise after finalization.
    /// Defaults to `{failed}` per spec §4.11.
    pub task_halt: HashSet<ResultStatus>,
    /// Default halt set a `Workflow` group falls back to when it declares
    /// no `workflow_halt` of its own (spec §4.12).
    pub workflow_halt: HashSet<ResultStatus>,
    pub tags: Vec<String>,
    pub deprecated: Deprecation,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            task_halt: HashSet::from([ResultStatus::Failed]),
            workflow_halt: HashSet::from([ResultStatus::Failed]),
            tags: Vec::new(),
            deprecated: Deprecation::None,
        }
    }
}

/// How a `Task` is constructed (spec §4.10 "Input may be …").
pub enum TaskInput {
    /// Build a fresh `Context` from this mapping.
    Map(Map<String, Value>),
    /// Reuse an existing `Context` — the "child task invoked with the same
    /// input" and "Context extracted from a passed-in Result" cases
    /// collapse to this once the caller already has the `Context` in hand.
    SharedContext(Context),
}

impl TaskInput {
    pub fn empty() -> Self {
        TaskInput::Map(Map::new())
    }

    pub fn into_context(self) -> Context {
        match self {
            TaskInput::Map(map) => Context::from_map(map),
            TaskInput::SharedContext(ctx) => ctx,
        }
    }
}

impl From<Map<String, Value>> for TaskInput {
    fn from(map: Map<String, Value>) -> Self {
        TaskInput::Map(map)
    }
}

impl From<Context> for TaskInput {
    fn from(ctx: Context) -> Self {
        TaskInput::SharedContext(ctx)
    }
}

/// Instance-side state every `Task` carries (spec §3 "Task … instance
/// carries").
pub struct TaskInstance {
    pub id: Uuid,
    pub class_name: &'static str,
    pub context: Context,
    pub errors: Errors,
    /// Resolved-attribute cache, keyed by method name (spec §9 "expose
    /// attribute values through an explicit `task.attr(name)` accessor").
    pub cache: HashMap<String, Value>,
    pub result: TaskResult,
    pub chain: Option<Arc<Mutex<Chain>>>,
    pub is_root: bool,
    pub frozen: bool,
}

impl TaskInstance {
    pub fn new(class_name: &'static str, context: Context, index: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            class_name,
            context,
            errors: Errors::new(),
            cache: HashMap::new(),
            result: TaskResult::new(class_name, index),
            chain: None,
            is_root: false,
            frozen: false,
        }
    }

    /// The resolved value of an already-defined attribute. `None` if the
    /// attribute was never registered or never successfully resolved.
    pub fn attr(&self, method_name: &str) -> Option<&Value> {
        self.cache.get(method_name)
    }

    /// `result.skip!` with the default `halt: true` — records the reason,
    /// transitions status/state, and returns the `Err` the body should
    /// propagate with `?`.
    pub fn skip_bang(&mut self, reason: impl Into<Option<String>>) -> Result<(), TaskFailure> {
        self.result.skip(reason.into(), true)?;
        Err(TaskFailure::LocalSkip)
    }

    /// `result.skip!(halt: false)` — same transition, body continues.
    pub fn skip_quiet(&mut self, reason: impl Into<Option<String>>) -> Result<(), TaskFailure> {
        self.result.skip(reason.into(), false)?;
        Ok(())
    }

    pub fn fail_bang(&mut self, reason: impl Into<Option<String>>) -> Result<(), TaskFailure> {
        self.result.fail(reason.into(), true)?;
        Err(TaskFailure::LocalFail)
    }

    pub fn fail_quiet(&mut self, reason: impl Into<Option<String>>) -> Result<(), TaskFailure> {
        self.result.fail(reason.into(), false)?;
        Ok(())
    }
}

/// The contract a unit of work implements (spec §4.10).
///
/// `call`/`call_bang` live in [`crate::executor`] as free functions
/// generic over `T: Task` rather than inherent methods: they run the full
/// middleware/callback/attribute pipeline around a task the executor
/// itself constructs, so there is no `self` to call them on beforehand.
#[async_trait]
pub trait Task: Sized + Send + Sync + 'static {
    fn class_name() -> &'static str;

    /// `"Task"` or `"Workflow"`, surfaced by [`crate::serializer`] — a
    /// `Workflow` impl overrides this to `"Workflow"` in its own `Task`
    /// impl block (spec §4.14 `type: "Task"|"Workflow"`).
    fn task_kind() -> &'static str {
        "Task"
    }

    fn attributes() -> AttributeRegistry {
        AttributeRegistry::new()
    }

    fn callbacks() -> CallbackRegistry {
        CallbackRegistry::new()
    }

    fn middlewares() -> MiddlewareRegistry {
        MiddlewareRegistry::new()
    }

    fn settings() -> TaskSettings {
        TaskSettings::default()
    }

    fn new(input: TaskInput, index: usize) -> Self;

    fn instance(&self) -> &TaskInstance;
    fn instance_mut(&mut self) -> &mut TaskInstance;

    /// Dynamic dispatch target for `Source::Named`/`DefaultValue::Named`
    /// (spec §9 "tagged union … no reflection needed"). Override to expose
    /// task methods an `Attribute` can source or default from by name.
    fn resolve_method(&self, _name: &str) -> Option<Value> {
        None
    }

    /// The user-defined body (spec §4.10 "Instance method `call` … must be
    /// provided by the subclass").
    async fn call(&mut self) -> Result<(), TaskFailure>;
}

/// Object-safe facade over the parts of [`Task`] the attribute and
/// validation pipelines need. Letting `AttributeRegistry`/`ValidatorRegistry`
/// take `&mut dyn AttributeHost` instead of being generic over `T: Task`
/// keeps those modules decoupled from any concrete task type and avoids
/// duplicating their logic per monomorphization.
pub trait AttributeHost: Send + Sync {
    fn instance(&self) -> &TaskInstance;
    fn instance_mut(&mut self) -> &mut TaskInstance;
    fn resolve_method(&self, name: &str) -> Option<Value>;

    /// Lets the executor recover the concrete `T: Task` behind the
    /// type-erased reference it threads through the attribute, callback
    /// and middleware pipelines, to invoke the one method — `Task::call`
    /// — that isn't part of this facade.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

impl<T: Task> AttributeHost for T {
    fn instance(&self) -> &TaskInstance {
        Task::instance(self)
    }

    fn instance_mut(&mut self) -> &mut TaskInstance {
        Task::instance_mut(self)
    }

    fn resolve_method(&self, name: &str) -> Option<Value> {
        Task::resolve_method(self, name)
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
