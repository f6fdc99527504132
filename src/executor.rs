//! Executor — the fixed run loop every `Task` goes through: join/create
//! Chain, attribute pipeline, user body, outcome classification, callbacks,
//! finalize (spec §4.11).

use crate::attribute::AttributeRegistry;
use crate::callback::{CallbackEvent, CallbackRegistry};
use crate::chain::AmbientChain;
use crate::correlator::Correlator;
use crate::fault::{Fault, TaskFailure};
use crate::result::{ResultState, ResultStatus, TaskResult};
use crate::task::{AttributeHost, Deprecation, Task, TaskInput};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// `ClassName.call(input)` — never raises for controlled faults; every
/// exception and fault ends up reflected in the returned `Result`
/// (spec §4.10).
pub async fn call<T: Task>(input: TaskInput) -> Arc<TaskResult> {
    match call_bang::<T>(input).await {
        Ok(result) => result,
        Err(fault) => fault.result().clone(),
    }
}

/// `ClassName.call!(input)` — re-raises a `Fault` when the finished
/// result's status is in the class's `task_halt` set (spec §4.11).
pub async fn call_bang<T: Task>(input: TaskInput) -> Result<Arc<TaskResult>, Fault> {
    ensure_ambient_scopes(run::<T>(input)).await
}

async fn ensure_ambient_scopes<Fut, R>(fut: Fut) -> R
where
    Fut: Future<Output = R>,
{
    let chain_active = AmbientChain::scope_active();
    let correlator_active = Correlator::scope_active();
    match (chain_active, correlator_active) {
        (true, true) => fut.await,
        (true, false) => Correlator::with_root_scope_async(fut).await,
        (false, true) => AmbientChain::with_root_scope_async(fut).await,
        (false, false) => {
            AmbientChain::with_root_scope_async(Correlator::with_root_scope_async(fut)).await
        }
    }
}

async fn run<T: Task>(input: TaskInput) -> Result<Arc<TaskResult>, Fault> {
    let settings = T::settings();

    if settings.deprecated == Deprecation::Raise {
        return Err(deprecated_fault::<T>());
    }
    if matches!(settings.deprecated, Deprecation::Log | Deprecation::Warn) {
        tracing::warn!(class = T::class_name(), "deprecated task instantiated");
    }

    // Reserve this task's chain slot *before* its body runs: a nested call
    // always finishes before the parent that made it, so filling slots in
    // completion order would put children ahead of their parent. Reserving
    // up front keeps the chain in call order regardless of finish order
    // (spec §8 invariant 4). A Workflow coordinates other tasks but never
    // logs itself into the chain it hands to them (spec §8 scenario D).
    let (chain, is_root) = AmbientChain::ensure();
    let participates = T::task_kind() != "Workflow";
    let index = if participates { AmbientChain::reserve(&chain) } else { 0 };

    let mut task = T::new(input, index);
    Task::instance_mut(&mut task).is_root = is_root;

    let attributes = T::attributes();
    let callbacks = T::callbacks();
    let middlewares = T::middlewares();

    middlewares
        .call_around(&mut task, move |dyn_task| {
            Box::pin(async move { run_pipeline::<T>(dyn_task, &attributes, &callbacks).await })
        })
        .await
        .ok();

    finalize::<T>(&mut task, &settings, chain, is_root, index, participates)
}

/// `deprecated: :raise` short-circuits before a `Task` is even
/// constructed — there is no instance to join a chain with yet, so the
/// synthesized result stands alone at index 0 (spec §6 `deprecated`).
fn deprecated_fault<T: Task>() -> Fault {
    let mut result = TaskResult::new(T::class_name(), 0);
    result.executing().ok();
    result
        .fail(
            Some(format!("{} is deprecated and may not be instantiated", T::class_name())),
            false,
        )
        .ok();
    let result = Arc::new(result);
    AmbientChain::build(result.clone());
    Fault::Failed(result)
}

/// `pre_execution!` / `execution!` / outcome classification / `post_execution!`
/// (spec §4.11 steps 2-5), run inside the middleware onion.
async fn run_pipeline<T: Task>(
    dyn_task: &mut dyn AttributeHost,
    attributes: &AttributeRegistry,
    callbacks: &CallbackRegistry,
) -> Result<(), TaskFailure> {
    callbacks.invoke(CallbackEvent::BeforeValidation, dyn_task);
    attributes.define_and_verify(dyn_task);
    callbacks.invoke(CallbackEvent::AfterValidation, dyn_task);

    let has_attribute_errors = !dyn_task.instance().errors.is_empty();

    if has_attribute_errors {
        let messages = dyn_task.instance().errors.full_messages();
        let error_map = dyn_task.instance().errors.as_map();
        let instance = dyn_task.instance_mut();
        instance.result.executing().ok();
        instance
            .result
            .metadata
            .insert("messages".into(), Value::Object(error_map));
        instance.result.fail(Some(messages), false).ok();
    } else {
        callbacks.invoke(CallbackEvent::BeforeExecution, dyn_task);
        dyn_task.instance_mut().result.executing().ok();
        callbacks.invoke(CallbackEvent::OnExecuting, dyn_task);

        let start = std::time::Instant::now();
        let task = dyn_task
            .as_any_mut()
            .downcast_mut::<T>()
            .expect("AttributeHost -> T downcast: executor always wraps the T it built");
        let body_result = task.call().await;
        let runtime = start.elapsed().as_secs_f64();

        let instance = Task::instance_mut(task);
        instance.result.set_runtime(runtime);
        match body_result {
            Ok(()) => {
                instance.result.complete().ok();
            }
            Err(TaskFailure::LocalSkip) | Err(TaskFailure::LocalFail) => {
                // `skip_bang`/`fail_bang` already drove the transition.
            }
            Err(TaskFailure::Child(fault)) => {
                instance.result.throw(fault.result()).ok();
            }
            Err(TaskFailure::Invariant(e)) => {
                instance.result.fail(Some(e.to_string()), false).ok();
            }
            Err(TaskFailure::Other(e)) => {
                let reason = format!("[{}] {e}", instance.class_name);
                // spec.md §4/§6: a failure from an unhandled body exception
                // carries the exception itself in metadata, not just a
                // flattened reason string.
                instance
                    .result
                    .metadata
                    .insert("original_exception".into(), Value::String(format!("{e:?}")));
                instance.result.fail(Some(reason), false).ok();
            }
        }
    }

    post_execution(dyn_task, callbacks);
    Ok(())
}

fn post_execution(dyn_task: &mut dyn AttributeHost, callbacks: &CallbackRegistry) {
    let state = dyn_task.instance().result.state;
    let status = dyn_task.instance().result.status;

    match state {
        ResultState::Complete => callbacks.invoke(CallbackEvent::OnComplete, dyn_task),
        ResultState::Interrupted => callbacks.invoke(CallbackEvent::OnInterrupted, dyn_task),
        ResultState::Initialized | ResultState::Executing => {}
    }
    callbacks.invoke(CallbackEvent::OnExecuted, dyn_task);

    match status {
        ResultStatus::Success => callbacks.invoke(CallbackEvent::OnSuccess, dyn_task),
        ResultStatus::Skipped => callbacks.invoke(CallbackEvent::OnSkipped, dyn_task),
        ResultStatus::Failed => callbacks.invoke(CallbackEvent::OnFailed, dyn_task),
    }
    if status != ResultStatus::Failed {
        callbacks.invoke(CallbackEvent::OnGood, dyn_task);
    }
    if status != ResultStatus::Success {
        callbacks.invoke(CallbackEvent::OnBad, dyn_task);
    }
    callbacks.invoke(CallbackEvent::AfterExecution, dyn_task);
}

/// `finalize!`: log, freeze, join the chain, and decide whether
/// `call_bang` needs to re-raise (spec §4.11 steps 6-7, `call!` variant).
fn finalize<T: Task>(
    task: &mut T,
    settings: &crate::task::TaskSettings,
    chain: Arc<std::sync::Mutex<crate::chain::Chain>>,
    is_root: bool,
    index: usize,
    participates: bool,
) -> Result<Arc<TaskResult>, Fault> {
    let instance = Task::instance_mut(task);

    tracing::info!(
        class = instance.class_name,
        outcome = %instance.result.outcome(),
        runtime = instance.result.runtime,
        "finalize",
    );

    let freezing_enabled = std::env::var("SKIP_CMDX_FREEZING").is_err();
    if freezing_enabled {
        instance.frozen = true;
        if instance.is_root {
            instance.context.freeze();
        }
    }

    let result = Arc::new(instance.result.clone());
    if participates {
        AmbientChain::place(&chain, index, result.clone());
    }
    instance.chain = Some(chain);
    if is_root {
        AmbientChain::clear();
    }

    if settings.task_halt.contains(&result.status) {
        let fault = if result.status == ResultStatus::Skipped {
            Fault::Skipped(result)
        } else {
            Fault::Failed(result)
        };
        Err(fault)
    } else {
        Ok(result)
    }
}
