//! End-to-end scenario D and invariant 10: halt propagation through a
//! Workflow's grouped task execution, and group `if`/`unless` skipping.

use async_trait::async_trait;
use std::collections::HashSet;
use taskchain::{
    call, workflow::{run_groups, ExecutionGroup, TaskHandle, Workflow},
    ResultStatus, Task, TaskFailure, TaskInput, TaskInstance,
};

struct A {
    instance: TaskInstance,
}

#[async_trait]
impl Task for A {
    fn class_name() -> &'static str {
        "A"
    }
    fn new(input: TaskInput, index: usize) -> Self {
        Self { instance: TaskInstance::new(Self::class_name(), input.into_context(), index) }
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

struct B {
    instance: TaskInstance,
}

#[async_trait]
impl Task for B {
    fn class_name() -> &'static str {
        "B"
    }
    fn new(input: TaskInput, index: usize) -> Self {
        Self { instance: TaskInstance::new(Self::class_name(), input.into_context(), index) }
    }
    fn instance(&self) -> &TaskInstance {
        &self.instance
    }
    fn instance_mut(&mut self) -> &mut TaskInstance {
        &mut self.instance
    }
    async fn call(&mut self) -> Result<(), TaskFailure> {
        self.instance.fail_bang(Some("B broke".to_string()))
    }
}

struct C {
    instance: TaskInstance,
}

#[async_trait]
impl Task for C {
    fn class_name() -> &'static str {
        "C"
    }
    fn new(input: TaskInput, index: usize) -> Self {
        Self { instance: TaskInstance::new(Self::class_name(), input.into_context(), index) }
    }
    fn instance(&self) -> &TaskInstance {
        &self.instance
    }
    fn instance_mut(&mut self) -> &mut TaskInstance {
        &mut self.instance
    }
    async fn call(&mut self) -> Result<(), TaskFailure> {
        self.instance.context.set("c_ran", true);
        Ok(())
    }
}

struct HaltingWorkflow {
    instance: TaskInstance,
}

#[async_trait]
impl Task for HaltingWorkflow {
    fn class_name() -> &'static str {
        "HaltingWorkflow"
    }
    fn task_kind() -> &'static str {
        "Workflow"
    }
    fn new(input: TaskInput, index: usize) -> Self {
        Self { instance: TaskInstance::new(Self::class_name(), input.into_context(), index) }
    }
    fn instance(&self) -> &TaskInstance {
        &self.instance
    }
    fn instance_mut(&mut self) -> &mut TaskInstance {
        &mut self.instance
    }
    async fn call(&mut self) -> Result<(), TaskFailure> {
        run_groups(Self::groups(), Self::workflow_halt(), &mut self.instance).await
    }
}

impl Workflow for HaltingWorkflow {
    fn groups() -> Vec<ExecutionGroup> {
        vec![ExecutionGroup::new([TaskHandle::of::<A>(), TaskHandle::of::<B>(), TaskHandle::of::<C>()])]
    }
}

struct NonHaltingWorkflow {
    instance: TaskInstance,
}

#[async_trait]
impl Task for NonHaltingWorkflow {
    fn class_name() -> &'static str {
        "NonHaltingWorkflow"
    }
    fn task_kind() -> &'static str {
        "Workflow"
    }
    fn new(input: TaskInput, index: usize) -> Self {
        Self { instance: TaskInstance::new(Self::class_name(), input.into_context(), index) }
    }
    fn instance(&self) -> &TaskInstance {
        &self.instance
    }
    fn instance_mut(&mut self) -> &mut TaskInstance {
        &mut self.instance
    }
    async fn call(&mut self) -> Result<(), TaskFailure> {
        run_groups(Self::groups(), Self::workflow_halt(), &mut self.instance).await
    }
}

impl Workflow for NonHaltingWorkflow {
    fn groups() -> Vec<ExecutionGroup> {
        vec![ExecutionGroup::new([TaskHandle::of::<A>(), TaskHandle::of::<B>(), TaskHandle::of::<C>()])
            .workflow_halt(HashSet::new())]
    }
}

#[tokio::test]
async fn scenario_d_workflow_halts_after_b_fails() {
    // Pre-establish the ambient chain so it's still reachable after `call`
    // returns — a root call clears it on finalize (see the serialization
    // test's own `AmbientChain::ensure()` pre-establishment for the same
    // reason).
    taskchain::chain::AmbientChain::with_root_scope_async(async {
        let (chain, _) = taskchain::chain::AmbientChain::ensure();
        let context = taskchain::Context::new();
        let result = call::<HaltingWorkflow>(TaskInput::SharedContext(context.clone())).await;
        assert_eq!(result.status, ResultStatus::Failed);
        // C is never reached once B trips the halt.
        assert_eq!(context.get("c_ran"), None);

        // The workflow itself never logs into the chain (spec §8 scenario
        // D); A and B do, in call order, and C is never reserved a slot.
        let results = chain.lock().unwrap().results();
        let classes: Vec<_> = results.iter().map(|r| r.class_name.as_str()).collect();
        assert_eq!(classes, vec!["A", "B"]);
    })
    .await;
}

#[tokio::test]
async fn scenario_d_with_empty_workflow_halt_c_still_runs() {
    let context = taskchain::Context::new();
    let result = call::<NonHaltingWorkflow>(TaskInput::SharedContext(context.clone())).await;
    // B's failure never trips a halt because the group's workflow_halt is empty.
    assert_eq!(result.outcome(), "success");
    assert_eq!(context.get("c_ran"), Some(serde_json::Value::Bool(true)));
}

#[tokio::test]
async fn invariant_10_skipped_group_appends_no_results() {
    taskchain::chain::AmbientChain::with_root_scope_async(async {
        let context = taskchain::Context::new();
        let mut instance = TaskInstance::new("Wf", context, 0);
        instance.result.executing().unwrap();

        let groups = vec![ExecutionGroup::new([TaskHandle::of::<A>()]).if_true(|_| false)];
        run_groups(groups, HashSet::from([ResultStatus::Failed]), &mut instance).await.unwrap();

        let chain = taskchain::chain::AmbientChain::current().unwrap();
        assert_eq!(chain.lock().unwrap().results().len(), 0);
    })
    .await;
}
