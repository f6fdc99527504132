//! Chain — the ordered log of `TaskResult`s produced by one root task
//! execution plus everything nested inside it (spec §3, §4.2).

use crate::correlator::Correlator;
use crate::result::TaskResult;
use std::cell::RefCell;
use std::future::Future;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Slots are reserved when a participating task *starts* (call order) and
/// filled when it *finishes* (completion order) — see [`AmbientChain::reserve`]
/// / [`AmbientChain::place`]. A child nested inside a parent's body always
/// finishes before that parent does, so filling by completion order alone
/// would put children ahead of the parent that called them; reserving the
/// slot up front keeps `results()` in call order regardless of finish order,
/// which is what spec §4.2/§8 invariant 4 ("`c.results[0]` is the root
/// task's Result") requires.
#[derive(Debug)]
pub struct Chain {
    pub id: String,
    slots: Vec<Option<Arc<TaskResult>>>,
}

impl Chain {
    fn new(id: Option<String>) -> Self {
        let id = id
            .or_else(Correlator::id)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            id,
            slots: Vec::new(),
        }
    }

    fn reserve(&mut self) -> usize {
        let index = self.slots.len();
        self.slots.push(None);
        index
    }

    fn place(&mut self, index: usize, result: Arc<TaskResult>) {
        self.slots[index] = Some(result);
    }

    /// Finished results in call order. A reserved-but-not-yet-finished slot
    /// (an ancestor of the task currently running) is simply absent rather
    /// than `null` — nothing observes a chain mid-execution in this crate.
    pub fn results(&self) -> Vec<Arc<TaskResult>> {
        self.slots.iter().filter_map(Clone::clone).collect()
    }

    pub fn first(&self) -> Option<Arc<TaskResult>> {
        self.slots.iter().flatten().next().cloned()
    }

    pub fn last(&self) -> Option<Arc<TaskResult>> {
        self.slots.iter().rev().flatten().next().cloned()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// See correlator.rs for why this is task-local rather than thread-local:
// the ambient chain must survive a task being resumed on a different
// worker thread after an `.await`.
tokio::task_local! {
    static CURRENT_CHAIN: RefCell<Option<Arc<Mutex<Chain>>>>;
}

pub struct AmbientChain;

impl AmbientChain {
    pub fn current() -> Option<Arc<Mutex<Chain>>> {
        CURRENT_CHAIN.try_with(|c| c.borrow().clone()).unwrap_or(None)
    }

    fn set(chain: Arc<Mutex<Chain>>) {
        let _ = CURRENT_CHAIN.try_with(|c| *c.borrow_mut() = Some(chain));
    }

    pub fn clear() {
        let _ = CURRENT_CHAIN.try_with(|c| *c.borrow_mut() = None);
    }

    /// Returns the active chain, creating and registering an empty one if
    /// none exists yet in the current scope. Returns whether this call
    /// created it (i.e. this execution is root within the active scope).
    /// The executor calls this before a task's body runs, so that nested
    /// calls see the chain as already active instead of racing to create
    /// their own.
    pub fn ensure() -> (Arc<Mutex<Chain>>, bool) {
        if let Some(chain) = Self::current() {
            (chain, false)
        } else {
            let chain = Arc::new(Mutex::new(Chain::new(None)));
            Self::set(chain.clone());
            (chain, true)
        }
    }

    /// Reserves the next slot in `chain`, returning its index. Call before
    /// a task's body runs so its position reflects call order rather than
    /// completion order.
    pub fn reserve(chain: &Arc<Mutex<Chain>>) -> usize {
        chain.lock().expect("chain mutex poisoned").reserve()
    }

    /// Fills a slot previously returned by `reserve` on the same chain.
    pub fn place(chain: &Arc<Mutex<Chain>>, index: usize, result: Arc<TaskResult>) {
        chain.lock().expect("chain mutex poisoned").place(index, result);
    }

    /// Convenience for call sites with no need to reserve ahead of a body
    /// running (synthesized faults, tests): reserve-and-place in one shot.
    pub fn build(result: Arc<TaskResult>) -> (Arc<Mutex<Chain>>, bool) {
        let (chain, is_root) = Self::ensure();
        let index = Self::reserve(&chain);
        Self::place(&chain, index, result);
        (chain, is_root)
    }

    /// Establishes an empty root scope for ambient chain storage. The
    /// executor enters this once per root `Task::call`; synchronous
    /// tests that call `build` without going through the executor need
    /// it too, since `try_with` sees "no scope" otherwise.
    pub fn with_root_scope<R>(f: impl FnOnce() -> R) -> R {
        CURRENT_CHAIN.sync_scope(RefCell::new(None), f)
    }

    pub async fn with_root_scope_async<R>(fut: impl Future<Output = R>) -> R {
        CURRENT_CHAIN.scope(RefCell::new(None), fut).await
    }

    /// Whether a chain scope is active at all, independent of whether a
    /// `Chain` has actually been built in it yet. Lets the executor tell
    /// "no scope entered" apart from "scope entered, chain still empty".
    pub fn scope_active() -> bool {
        CURRENT_CHAIN.try_with(|_| ()).is_ok()
    }
}
