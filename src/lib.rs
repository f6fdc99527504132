//! # taskchain
//!
//! A command/task execution framework: declarative attributes with
//! coercion and validation, a strict Result state/status machine, ambient
//! correlation Chains, callback and middleware hooks, and Workflow
//! composition for running groups of tasks against shared state.
//!
//! Start with [`task::Task`] for a single unit of work, or
//! [`workflow::Workflow`] to compose several. Both run through
//! [`executor::call`]/[`executor::call_bang`].

pub mod attribute;
pub mod callback;
pub mod chain;
pub mod coercion;
pub mod context;
pub mod correlator;
pub mod error;
pub mod executor;
pub mod fault;
pub mod middleware;
pub mod result;
pub mod serializer;
pub mod task;
pub mod validation;
pub mod workflow;

pub use attribute::{Attribute, AttributeRegistry, DefaultValue, Errors, Source};
pub use callback::{CallbackEvent, CallbackRegistry, Guard};
pub use chain::{AmbientChain, Chain};
pub use coercion::CoercionRegistry;
pub use context::Context;
pub use correlator::Correlator;
pub use error::CmdxError;
pub use executor::{call, call_bang};
pub use fault::{Fault, TaskFailure};
pub use middleware::{Middleware, MiddlewareRegistry};
pub use result::{ResultState, ResultStatus, TaskResult};
pub use serializer::{inspect_chain, inspect_result, serialize_chain, serialize_result, serialize_task};
pub use task::{AttributeHost, Deprecation, Task, TaskInput, TaskInstance, TaskSettings};
pub use validation::ValidatorRegistry;
pub use workflow::{ExecutionGroup, TaskHandle, Workflow};
