//! Crate-wide error taxonomy.
//!
//! Each concern gets its own small `thiserror` enum (coercion, validation,
//! lifecycle invariants, deprecation), and `CmdxError` is the umbrella type
//! returned by the public `Task::call`/`Task::call_bang` entry points.

use thiserror::Error;

/// Raised by a `CoercionRegistry` entry when a value cannot be converted.
#[derive(Debug, Error, Clone)]
#[error("could not coerce into {type_name}: {reason}")]
pub struct CoercionError {
    pub type_name: String,
    pub reason: String,
}

impl CoercionError {
    pub fn new(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

/// Raised when a coercion id is not present in the registry.
#[derive(Debug, Error, Clone)]
#[error("unknown coercion type: {0}")]
pub struct UnknownCoercionError(pub String);

/// Raised by a `ValidatorRegistry` entry when a value fails validation.
/// Its `Display` text becomes the per-attribute error message.
#[derive(Debug, Error, Clone)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A `Result` state or status transition that does not match one of the
/// allowed edges (spec §4.1).
#[derive(Debug, Error, Clone)]
#[error("invalid transition: cannot go from {from} to {to}")]
pub struct InvariantViolation {
    pub from: String,
    pub to: String,
}

impl InvariantViolation {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Raised on instantiation when a task class is marked `deprecated: raise`.
#[derive(Debug, Error, Clone)]
#[error("{task_name} is deprecated and may not be instantiated")]
pub struct DeprecationError {
    pub task_name: String,
}

/// Crate-wide error, returned by the public execution entry points for
/// anything that isn't itself a controlled `Fault` (see `fault.rs`).
#[derive(Debug, Error)]
pub enum CmdxError {
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(transparent)]
    UnknownCoercion(#[from] UnknownCoercionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error(transparent)]
    Deprecation(#[from] DeprecationError),

    /// Anything raised by user task-body code that isn't a recognized
    /// control-flow signal.
    #[error("[{task_name}] {message}")]
    Other {
        task_name: String,
        message: String,
    },
}

impl CmdxError {
    pub fn other(task_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Other {
            task_name: task_name.into(),
            message: message.into(),
        }
    }
}
