//! Correlator — ambient per-execution-context correlation id (spec §4.3).
//!
//! Ambient state is modeled with `tokio::task_local!` rather than
//! `std::thread_local!`: a multi-threaded `tokio` runtime may resume a
//! task on a different worker thread after an `.await`, which would break
//! a thread-local's isolation guarantee the moment a task body awaits
//! anything. Task-local storage travels with the task instead, giving the
//! "strict isolation between concurrent executions" spec §5 requires
//! regardless of which worker thread is doing the polling.

use std::cell::RefCell;
use std::future::Future;
use uuid::Uuid;

tokio::task_local! {
    static CURRENT_ID: RefCell<Option<String>>;
}

pub struct Correlator;

impl Correlator {
    /// A fresh UUIDv4 string, used when nothing more specific is supplied.
    pub fn generate() -> String {
        Uuid::new_v4().to_string()
    }

    /// Reads the ambient id. Returns `None` both when no id has been set
    /// and when called outside any `Correlator` scope.
    pub fn id() -> Option<String> {
        CURRENT_ID.try_with(|c| c.borrow().clone()).unwrap_or(None)
    }

    /// Writes the ambient id in place. No-op outside any active scope.
    pub fn set_id(id: impl Into<String>) {
        let _ = CURRENT_ID.try_with(|c| *c.borrow_mut() = Some(id.into()));
    }

    pub fn clear() {
        let _ = CURRENT_ID.try_with(|c| *c.borrow_mut() = None);
    }

    /// `Correlator.use(id) { … }` — scoped override for synchronous
    /// callers. Restores the prior id (or "no scope") on every exit path,
    /// including a panic unwinding through `f`.
    pub fn with<R>(id: impl Into<String>, f: impl FnOnce() -> R) -> R {
        CURRENT_ID.sync_scope(RefCell::new(Some(id.into())), f)
    }

    /// Async equivalent of [`Self::with`], for scopes that cross `.await`.
    pub async fn with_async<R>(id: impl Into<String>, fut: impl Future<Output = R>) -> R {
        CURRENT_ID.scope(RefCell::new(Some(id.into())), fut).await
    }

    /// Establishes an empty root scope so that `set_id`/`clear` have
    /// somewhere to write even before the first `with`. The executor
    /// enters this once per root task execution; tests that call
    /// `set_id` outside of a `with` block need it too.
    pub fn with_root_scope<R>(f: impl FnOnce() -> R) -> R {
        CURRENT_ID.sync_scope(RefCell::new(None), f)
    }

    pub async fn with_root_scope_async<R>(fut: impl Future<Output = R>) -> R {
        CURRENT_ID.scope(RefCell::new(None), fut).await
    }

    /// Whether a `Correlator` scope (root or nested) is currently active
    /// on this task. Used by the executor to decide whether a `call`
    /// needs to establish a fresh root scope or is already nested inside
    /// one started by a parent task.
    pub fn scope_active() -> bool {
        CURRENT_ID.try_with(|_| ()).is_ok()
    }
}
