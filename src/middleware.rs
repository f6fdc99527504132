//! MiddlewareRegistry — ordered wrappers around task execution (spec
//! §4.9).
//!
//! The source's `call(task, next)` lets a middleware run arbitrary code on
//! both sides of the inner body, or skip it entirely. A fully general
//! `next` continuation in Rust needs a boxed, higher-ranked async
//! closure — expressible, but it buys little over the dominant real use
//! cases (timing, auth, circuit breaking, rate limiting) at a real cost in
//! lifetime complexity. `before`/`after` hooks cover those cases exactly:
//! outermost-registered runs its `before` first and its `after` last, and
//! a `before` returning `Err` short-circuits everything nested inside it,
//! which is "replace the call entirely" for the case that matters.

use crate::fault::TaskFailure;
use crate::task::AttributeHost;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn before(&self, _task: &mut dyn AttributeHost) -> Result<(), TaskFailure> {
        Ok(())
    }

    async fn after(&self, _task: &mut dyn AttributeHost, _outcome: &Result<(), TaskFailure>) {}
}

#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Missing registry = identity (spec §4.9).
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Parent middlewares wrap outside of a subclass's own (spec §9
    /// "subclass initialization copies parent's list, then appends own").
    pub fn inherit(&self, own: &MiddlewareRegistry) -> MiddlewareRegistry {
        let mut merged = self.clone();
        merged.middlewares.extend(own.middlewares.iter().cloned());
        merged
    }

    /// Runs every registered middleware's `before` (registration order),
    /// then `inner`, then every middleware's `after` (reverse order) —
    /// the onion, outermost-first.
    pub async fn call_around<F>(
        &self,
        task: &mut dyn AttributeHost,
        inner: F,
    ) -> Result<(), TaskFailure>
    where
        F: for<'b> FnOnce(
            &'b mut dyn AttributeHost,
        ) -> Pin<Box<dyn Future<Output = Result<(), TaskFailure>> + Send + 'b>>,
    {
        for middleware in &self.middlewares {
            middleware.before(task).await?;
        }
        let outcome = inner(task).await;
        for middleware in self.middlewares.iter().rev() {
            middleware.after(task, &outcome).await;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::task::TaskInstance;
    use std::sync::Mutex;

    struct Dummy(TaskInstance);
    impl AttributeHost for Dummy {
        fn instance(&self) -> &TaskInstance {
            &self.0
        }
        fn instance_mut(&mut self) -> &mut TaskInstance {
            &mut self.0
        }
        fn resolve_method(&self, _name: &str) -> Option<serde_json::Value> {
            None
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    struct Recording {
        label: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Middleware for Recording {
        async fn before(&self, _task: &mut dyn AttributeHost) -> Result<(), TaskFailure> {
            self.order.lock().unwrap().push(self.label);
            Ok(())
        }

        async fn after(&self, _task: &mut dyn AttributeHost, _outcome: &Result<(), TaskFailure>) {
            self.order.lock().unwrap().push(self.label);
        }
    }

    #[tokio::test]
    async fn outermost_registered_wraps_outermost() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = MiddlewareRegistry::new();
        registry.use_middleware(Recording { label: "outer", order: order.clone() });
        registry.use_middleware(Recording { label: "inner", order: order.clone() });

        let mut dummy = Dummy(TaskInstance::new("T", Context::new(), 0));
        registry
            .call_around(&mut dummy, |_| {
                let order = order.clone();
                Box::pin(async move {
                    order.lock().unwrap().push("body");
                    Ok(())
                })
            })
            .await
            .unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["outer", "inner", "body", "inner", "outer"]);
    }

    #[tokio::test]
    async fn before_error_short_circuits_inner_and_later_middlewares() {
        let order = Arc::new(Mutex::new(Vec::new()));
        struct Blocking;
        #[async_trait]
        impl Middleware for Blocking {
            async fn before(&self, _task: &mut dyn AttributeHost) -> Result<(), TaskFailure> {
                Err(TaskFailure::LocalFail)
            }
        }
        let mut registry = MiddlewareRegistry::new();
        registry.use_middleware(Blocking);
        registry.use_middleware(Recording { label: "never", order: order.clone() });

        let mut dummy = Dummy(TaskInstance::new("T", Context::new(), 0));
        let result = registry
            .call_around(&mut dummy, |_| {
                let order = order.clone();
                Box::pin(async move {
                    order.lock().unwrap().push("body");
                    Ok(())
                })
            })
            .await;

        assert!(result.is_err());
        assert!(order.lock().unwrap().is_empty());
    }
}
