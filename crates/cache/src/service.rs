//! The facade hand-written service adapters delegate to.
//!
//! An adapter implements the service's own interface, builds an
//! [`Invocation`] per call and forwards it together with a closure that
//! calls the real implementation:
//!
//! ```ignore
//! impl Calculator for CachedCalculator {
//!     async fn square(&self, n: i64) -> Result<i64, CalcError> {
//!         let call = Invocation::new(Arc::clone(&self.square), vec![n.into()]);
//!         self.inner.call(call, move |calc| async move { calc.square(n).await }).await
//!     }
//! }
//! ```

use crate::envelope::Cacheable;
use crate::lookup::{LookupHandler, SyncLookupHandler};
use crate::matcher::PolicyProvider;
use crate::provider::CacheProvider;
use crate::stats::LookupStatsSnapshot;
use hoard_core::Invocation;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::warn;

/// A service implementation together with the handler caching its calls
pub struct CachedService<S, P, C> {
    service: Arc<S>,
    handler: LookupHandler<P, C>,
    runtime: Option<Handle>,
}

impl<S, P, C> Clone for CachedService<S, P, C> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            handler: self.handler.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

impl<S, P, C> CachedService<S, P, C>
where
    S: Send + Sync + 'static,
    P: PolicyProvider,
    C: CacheProvider,
{
    /// Wrap `service`. When created inside a tokio runtime, blocking calls
    /// use that runtime for cache access.
    pub fn new(service: S, policies: P, cache: C) -> Self {
        Self::from_parts(Arc::new(service), LookupHandler::new(policies, cache))
    }

    /// Share an existing handler, and with it the in-flight registry and
    /// statistics, between several services
    pub fn from_parts(service: Arc<S>, handler: LookupHandler<P, C>) -> Self {
        Self {
            service,
            handler,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Runtime for the cache access of [`call_blocking`](Self::call_blocking)
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    pub fn handler(&self) -> &LookupHandler<P, C> {
        &self.handler
    }

    pub fn stats(&self) -> LookupStatsSnapshot {
        self.handler.stats()
    }

    /// Run `operation` against the implementation unless the cache answers
    pub async fn call<R, E, F, Fut>(&self, invocation: Invocation, operation: F) -> Result<R, E>
    where
        R: Cacheable,
        E: Cacheable,
        F: FnOnce(Arc<S>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        self.handler
            .lookup(&invocation, move || operation(service))
            .await
    }

    /// Blocking form of [`call`](Self::call). Must not be called from inside
    /// an async task.
    ///
    /// Without a runtime to reach the cache with, the call goes straight to
    /// the implementation.
    pub fn call_blocking<R, E, F>(&self, invocation: Invocation, operation: F) -> Result<R, E>
    where
        R: Cacheable,
        E: Cacheable,
        F: FnOnce(&S) -> Result<R, E> + Send + 'static,
    {
        let Some(runtime) = &self.runtime else {
            warn!(method = %invocation.method, "no runtime for cache access, calling through");
            return operation(&self.service);
        };
        let service = Arc::clone(&self.service);
        SyncLookupHandler::new(self.handler.clone(), runtime.clone())
            .lookup(&invocation, move || operation(&service))
    }

    /// Delete-by-key: drop whatever is cached for `invocation`
    pub async fn invalidate(&self, invocation: &Invocation) -> bool {
        self.handler.invalidate(invocation).await
    }
}
