//! Fault — the control-flow signal used to halt and propagate a task's
//! outcome through arbitrarily deep caller code (spec §3, §4.13).
//!
//! The source language raises these as exceptions and catches them at the
//! executor boundary. Rust's idiomatic analogue of "unwind through caller
//! code automatically" is `Result<_, Fault>` threaded with `?`: a nested
//! `Task::call` that wants to propagate a child's failure simply does
//! `child.call(ctx).await?`, and the `?` carries the `Fault` up through
//! every parent frame without any of them needing to know about it.

use crate::error::InvariantViolation;
use crate::result::TaskResult;
use std::sync::Arc;

/// A tagged halt signal carrying the `TaskResult` that triggered it.
#[derive(Debug, Clone)]
pub enum Fault {
    Skipped(Arc<TaskResult>),
    Failed(Arc<TaskResult>),
}

impl Fault {
    pub fn result(&self) -> &Arc<TaskResult> {
        match self {
            Fault::Skipped(r) | Fault::Failed(r) => r,
        }
    }

    /// The fully-qualified name of the task class that originated this
    /// fault, as recorded on the carried `TaskResult`.
    pub fn task_class(&self) -> &str {
        &self.result().class_name
    }

    /// `Fault::for?(names)` — true when this fault's originating task
    /// class is named in `classes`.
    pub fn is_for(&self, classes: &[&str]) -> bool {
        classes.iter().any(|c| *c == self.task_class())
    }

    /// `Fault::matches?(predicate)` — true when `predicate` holds for this
    /// fault's carried result.
    pub fn matches(&self, predicate: impl Fn(&TaskResult) -> bool) -> bool {
        predicate(self.result())
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fault::Skipped(r) => write!(f, "{} skipped", r.class_name),
            Fault::Failed(r) => write!(f, "{} failed", r.class_name),
        }
    }
}

impl std::error::Error for Fault {}

/// What a `Task::call` body can fail with (spec §4.11 step 4, §7).
///
/// The source distinguishes "this task's own fault" from "a child task's
/// fault" by comparing the raised fault's `Result` identity against the
/// task's own `Result`. Rust's `?`-based propagation makes that identity
/// check unnecessary: `TaskInstance::skip_bang`/`fail_bang` tag the
/// variant directly at the point a local halt happens, and a child's
/// `Fault` only ever reaches a parent body through `executor::call_bang`,
/// so the two cases never need to be told apart after the fact.
#[derive(Debug)]
pub enum TaskFailure {
    /// This task's own `result.skip!` unwound the body.
    LocalSkip,
    /// This task's own `result.fail!` unwound the body.
    LocalFail,
    /// A child task's `call_bang` propagated its `Fault` upward.
    Child(Fault),
    /// A `Result` state/status invariant was violated (programmer error).
    Invariant(InvariantViolation),
    /// Any other error the task body returned.
    Other(anyhow::Error),
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskFailure::LocalSkip => write!(f, "task skipped"),
            TaskFailure::LocalFail => write!(f, "task failed"),
            TaskFailure::Child(fault) => write!(f, "{fault}"),
            TaskFailure::Invariant(e) => write!(f, "{e}"),
            TaskFailure::Other(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TaskFailure {}

impl From<Fault> for TaskFailure {
    fn from(fault: Fault) -> Self {
        TaskFailure::Child(fault)
    }
}

impl From<InvariantViolation> for TaskFailure {
    fn from(e: InvariantViolation) -> Self {
        TaskFailure::Invariant(e)
    }
}

impl From<anyhow::Error> for TaskFailure {
    fn from(e: anyhow::Error) -> Self {
        TaskFailure::Other(e)
    }
}
