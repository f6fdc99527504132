//! Workflow — grouped sequential composition of tasks sharing one Context
//! and Chain (spec §4.12).

use crate::context::Context;
use crate::executor;
use crate::fault::{Fault, TaskFailure};
use crate::result::ResultStatus;
use crate::task::{Task, TaskInput, TaskInstance};
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::sync::Arc;

/// Type-erases a concrete `T: Task` behind a closure rather than requiring
/// `Task` itself to be dyn-compatible (it can't be: `new`/`call` make it
/// generic-parameterized and `Sized`). `of::<T>()` captures everything
/// needed to run `T` against a shared `Context` later.
#[derive(Clone)]
pub struct TaskHandle {
    class_name: &'static str,
    invoke: Arc<dyn Fn(Context) -> BoxFuture<'static, Result<Arc<crate::result::TaskResult>, Fault>> + Send + Sync>,
}

impl TaskHandle {
    pub fn of<T: Task>() -> Self {
        Self {
            class_name: T::class_name(),
            invoke: Arc::new(|ctx: Context| Box::pin(executor::call_bang::<T>(TaskInput::SharedContext(ctx)))),
        }
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }
}

/// `if`/`unless` evaluated against the Workflow's own instance before a
/// group runs (spec §4.12 step 1).
pub type GroupCondition = Arc<dyn Fn(&TaskInstance) -> bool + Send + Sync>;

/// One `process(tasks…, opts)` declaration (spec §4.12).
#[derive(Clone)]
pub struct ExecutionGroup {
    pub tasks: Vec<TaskHandle>,
    pub if_condition: Option<GroupCondition>,
    pub unless_condition: Option<GroupCondition>,
    /// Overrides the class-level `workflow_halt` setting for every task in
    /// this group; falls back to `{failed}` when neither is present.
    pub workflow_halt: Option<HashSet<ResultStatus>>,
}

impl ExecutionGroup {
    pub fn new(tasks: impl IntoIterator<Item = TaskHandle>) -> Self {
        Self {
            tasks: tasks.into_iter().collect(),
            if_condition: None,
            unless_condition: None,
            workflow_halt: None,
        }
    }

    pub fn if_true(mut self, condition: impl Fn(&TaskInstance) -> bool + Send + Sync + 'static) -> Self {
        self.if_condition = Some(Arc::new(condition));
        self
    }

    pub fn unless(mut self, condition: impl Fn(&TaskInstance) -> bool + Send + Sync + 'static) -> Self {
        self.unless_condition = Some(Arc::new(condition));
        self
    }

    pub fn workflow_halt(mut self, statuses: impl IntoIterator<Item = ResultStatus>) -> Self {
        self.workflow_halt = Some(statuses.into_iter().collect());
        self
    }

    fn should_run(&self, instance: &TaskInstance) -> bool {
        let passes_if = self.if_condition.as_ref().map(|c| c(instance)).unwrap_or(true);
        let passes_unless = self.unless_condition.as_ref().map(|c| !c(instance)).unwrap_or(true);
        passes_if && passes_unless
    }
}

/// A `Task` whose body is generated from declared execution groups, instead
/// of hand-written (spec §4.12 "A Workflow is a Task whose body is
/// generated"). Implement [`Workflow::groups`]; call [`run_groups`] from
/// [`crate::task::Task::call`] to get the standard body.
pub trait Workflow: Task {
    fn groups() -> Vec<ExecutionGroup>;

    /// Falls back to `{failed}` when a group and the class both leave
    /// `workflow_halt` unset (spec §4.12 step 3).
    fn workflow_halt() -> HashSet<ResultStatus> {
        HashSet::from([ResultStatus::Failed])
    }
}

/// Runs `groups` against `instance`'s shared `Context`/`Chain`, applying
/// the halt rule after every task. An empty group list is success (spec
/// §4.12 "An empty task list yields success").
pub async fn run_groups(
    groups: Vec<ExecutionGroup>,
    class_workflow_halt: HashSet<ResultStatus>,
    instance: &mut TaskInstance,
) -> Result<(), TaskFailure> {
    for group in groups {
        if !group.should_run(instance) {
            continue;
        }
        let halt_set = group.workflow_halt.clone().unwrap_or_else(|| class_workflow_halt.clone());

        for handle in &group.tasks {
            let context = instance.context.share();
            let outcome = (handle.invoke)(context).await;

            let result = match outcome {
                Ok(result) => result,
                Err(fault) => fault.result().clone(),
            };

            // `call_bang` already appended `result` to the shared ambient
            // chain at its own finalize step (spec §4.12 step 2).
            if halt_set.contains(&result.status) {
                instance.result.throw(&result)?;
                return Err(if result.status == ResultStatus::Skipped {
                    TaskFailure::LocalSkip
                } else {
                    TaskFailure::LocalFail
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeRegistry;
    use crate::chain::AmbientChain;
    use async_trait::async_trait;

    struct CountingTask {
        instance: TaskInstance,
    }

    #[async_trait]
    impl Task for CountingTask {
        fn class_name() -> &'static str {
            "CountingTask"
        }

        fn attributes() -> AttributeRegistry {
            AttributeRegistry::new()
        }

        fn new(input: TaskInput, index: usize) -> Self {
            Self {
                instance: TaskInstance::new(Self::class_name(), input.into_context(), index),
            }
        }

        fn instance(&self) -> &TaskInstance {
            &self.instance
        }

        fn instance_mut(&mut self) -> &mut TaskInstance {
            &mut self.instance
        }

        async fn call(&mut self) -> Result<(), TaskFailure> {
            let count = self.instance.context.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
            self.instance.context.set("count", count + 1);
            Ok(())
        }
    }

    struct FailingTask {
        instance: TaskInstance,
    }

    #[async_trait]
    impl Task for FailingTask {
        fn class_name() -> &'static str {
            "FailingTask"
        }

        fn new(input: TaskInput, index: usize) -> Self {
            Self {
                instance: TaskInstance::new(Self::class_name(), input.into_context(), index),
            }
        }

        fn instance(&self) -> &TaskInstance {
            &self.instance
        }

        fn instance_mut(&mut self) -> &mut TaskInstance {
            &mut self.instance
        }

        async fn call(&mut self) -> Result<(), TaskFailure> {
            self.instance.fail_bang(Some("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn failing_task_halts_the_workflow_and_throws_into_its_result() {
        AmbientChain::with_root_scope_async(async {
            let context = Context::new();
            context.set("count", 0);
            let mut instance = TaskInstance::new("Wf", context.clone(), 0);
            instance.result.executing().unwrap();

            let groups = vec![ExecutionGroup::new([
                TaskHandle::of::<FailingTask>(),
                TaskHandle::of::<CountingTask>(),
            ])];
            let outcome = run_groups(groups, HashSet::from([ResultStatus::Failed]), &mut instance).await;

            assert!(outcome.is_err());
            assert_eq!(instance.result.status, ResultStatus::Failed);
            assert!(instance.result.threw_failure());
            // the group stopped after the first task; CountingTask never ran.
            assert_eq!(context.get("count").and_then(|v| v.as_i64()), Some(0));
        })
        .await;
    }

    #[tokio::test]
    async fn empty_groups_yield_success() {
        AmbientChain::with_root_scope_async(async {
            let mut instance = TaskInstance::new("Wf", Context::new(), 0);
            instance.result.executing().unwrap();
            let outcome = run_groups(Vec::new(), HashSet::from([ResultStatus::Failed]), &mut instance).await;
            assert!(outcome.is_ok());
        })
        .await;
    }

    #[tokio::test]
    async fn sequential_tasks_share_context_and_accumulate() {
        AmbientChain::with_root_scope_async(async {
            let context = Context::new();
            context.set("count", 0);
            let mut instance = TaskInstance::new("Wf", context.clone(), 0);
            instance.result.executing().unwrap();

            let groups = vec![ExecutionGroup::new([
                TaskHandle::of::<CountingTask>(),
                TaskHandle::of::<CountingTask>(),
            ])];
            run_groups(groups, HashSet::from([ResultStatus::Failed]), &mut instance)
                .await
                .unwrap();

            assert_eq!(context.get("count").and_then(|v| v.as_i64()), Some(2));
        })
        .await;
    }

    #[tokio::test]
    async fn skipped_group_condition_leaves_context_untouched() {
        AmbientChain::with_root_scope_async(async {
            let context = Context::new();
            context.set("count", 0);
            let mut instance = TaskInstance::new("Wf", context.clone(), 0);
            instance.result.executing().unwrap();

            let groups = vec![ExecutionGroup::new([TaskHandle::of::<CountingTask>()]).if_true(|_| false)];
            run_groups(groups, HashSet::from([ResultStatus::Failed]), &mut instance)
                .await
                .unwrap();

            assert_eq!(context.get("count").and_then(|v| v.as_i64()), Some(0));
        })
        .await;
    }
}
