//! `TaskResult` — state + status machine, metadata and failure-chain
//! pointers (spec §3, §4.1).

use crate::error::InvariantViolation;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultState {
    Initialized,
    Executing,
    Complete,
    Interrupted,
}

impl std::fmt::Display for ResultState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResultState::Initialized => "initialized",
            ResultState::Executing => "executing",
            ResultState::Complete => "complete",
            ResultState::Interrupted => "interrupted",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Skipped,
    Failed,
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResultStatus::Success => "success",
            ResultStatus::Skipped => "skipped",
            ResultStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// The outcome record of one task execution (spec §3 "Result").
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub class_name: String,
    pub index: usize,
    pub state: ResultState,
    pub status: ResultStatus,
    pub metadata: Map<String, Value>,
    pub runtime: Option<f64>,
    /// The `TaskResult` that originated a failure; `None` until a failure
    /// has occurred. Points to `self`'s own id when this result caused its
    /// own failure locally, distinguished via `caused_failure_is_self`.
    caused_failure: Option<Arc<TaskResult>>,
    caused_failure_is_self: bool,
    /// The child `TaskResult` whose fault this result re-threw, if any.
    threw_failure: Option<Arc<TaskResult>>,
}

impl TaskResult {
    pub fn new(class_name: impl Into<String>, index: usize) -> Self {
        Self {
            class_name: class_name.into(),
            index,
            state: ResultState::Initialized,
            status: ResultStatus::Success,
            metadata: Map::new(),
            runtime: None,
            caused_failure: None,
            caused_failure_is_self: false,
            threw_failure: None,
        }
    }

    // ---- state transitions -------------------------------------------------

    pub fn executing(&mut self) -> Result<(), InvariantViolation> {
        self.transition_state(ResultState::Initialized, ResultState::Executing)
    }

    pub fn complete(&mut self) -> Result<(), InvariantViolation> {
        self.transition_state(ResultState::Executing, ResultState::Complete)
    }

    pub fn interrupt(&mut self) -> Result<(), InvariantViolation> {
        self.transition_state(ResultState::Executing, ResultState::Interrupted)
    }

    fn transition_state(
        &mut self,
        from: ResultState,
        to: ResultState,
    ) -> Result<(), InvariantViolation> {
        if self.state != from {
            return Err(InvariantViolation::new(self.state.to_string(), to.to_string()));
        }
        self.state = to;
        Ok(())
    }

    // ---- status transitions -------------------------------------------------

    /// `skip!`. Sets status to `skipped`, transitions state to
    /// `interrupted`, and returns a `Fault::Skipped` unless `halt` is
    /// false, matching the source's `halt: false` escape hatch.
    pub fn skip(&mut self, reason: Option<String>, halt: bool) -> Result<(), InvariantViolation> {
        self.transition_status(ResultStatus::Skipped)?;
        if let Some(reason) = reason {
            self.metadata.insert("reason".into(), Value::String(reason));
        }
        self.caused_failure_is_self = true;
        let _ = halt; // caller decides whether to raise the Fault
        self.interrupt()
    }

    /// `fail!`. Same shape as `skip`, but for the `failed` status.
    pub fn fail(&mut self, reason: Option<String>, halt: bool) -> Result<(), InvariantViolation> {
        self.transition_status(ResultStatus::Failed)?;
        if let Some(reason) = reason {
            self.metadata.insert("reason".into(), Value::String(reason));
        }
        self.caused_failure_is_self = true;
        let _ = halt;
        self.interrupt()
    }

    fn transition_status(&mut self, to: ResultStatus) -> Result<(), InvariantViolation> {
        if self.status != ResultStatus::Success {
            return Err(InvariantViolation::new(self.status.to_string(), to.to_string()));
        }
        self.status = to;
        Ok(())
    }

    /// `throw!(other)` — copy another result's failure pointers and apply
    /// the same status transition locally (spec §4.1).
    pub fn throw(&mut self, other: &Arc<TaskResult>) -> Result<(), InvariantViolation> {
        let caused = other
            .caused_failure
            .clone()
            .unwrap_or_else(|| other.clone());
        self.caused_failure = Some(caused);
        self.caused_failure_is_self = false;
        self.threw_failure = Some(other.clone());
        match other.status {
            ResultStatus::Skipped => self.transition_status(ResultStatus::Skipped)?,
            ResultStatus::Failed => self.transition_status(ResultStatus::Failed)?,
            ResultStatus::Success => return Ok(()),
        }
        self.interrupt()
    }

    /// `outcome` — derived label combining state and status.
    pub fn outcome(&self) -> String {
        if self.state != ResultState::Complete {
            self.state.to_string()
        } else {
            self.status.to_string()
        }
    }

    // ---- predicates -------------------------------------------------

    pub fn executed(&self) -> bool {
        matches!(self.state, ResultState::Complete | ResultState::Interrupted)
    }

    pub fn good(&self) -> bool {
        self.status != ResultStatus::Failed
    }

    pub fn bad(&self) -> bool {
        self.status != ResultStatus::Success
    }

    pub fn caused_failure(&self) -> bool {
        self.caused_failure_is_self
    }

    pub fn threw_failure(&self) -> bool {
        self.threw_failure.is_some()
    }

    pub fn thrown_failure(&self) -> bool {
        self.threw_failure.is_some() && !self.caused_failure_is_self
    }

    pub fn caused_failure_result(&self) -> Option<&Arc<TaskResult>> {
        self.caused_failure.as_ref()
    }

    pub fn threw_failure_result(&self) -> Option<&Arc<TaskResult>> {
        self.threw_failure.as_ref()
    }

    pub fn set_runtime(&mut self, seconds: f64) {
        self.runtime = Some(seconds);
    }
}
