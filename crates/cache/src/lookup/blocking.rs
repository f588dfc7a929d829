//! Lookup for callers on plain threads.

use super::{LookupHandler, Plan};
use crate::coalescer::Registration;
use crate::envelope::Cacheable;
use crate::matcher::PolicyProvider;
use crate::policy::CachePolicy;
use crate::provider::CacheProvider;
use hoard_core::Invocation;
use tokio::runtime::Handle;
use tracing::debug;

/// Blocking calling convention over a [`LookupHandler`].
///
/// Cache I/O and background refreshes run on the given runtime while the
/// real call of a miss runs on the calling thread. [`lookup`](Self::lookup)
/// blocks the thread, so it must not be called from inside an async task of
/// any runtime.
pub struct SyncLookupHandler<P, C> {
    handler: LookupHandler<P, C>,
    runtime: Handle,
}

impl<P, C> Clone for SyncLookupHandler<P, C> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

impl<P: PolicyProvider, C: CacheProvider> SyncLookupHandler<P, C> {
    pub fn new(handler: LookupHandler<P, C>, runtime: Handle) -> Self {
        Self { handler, runtime }
    }

    pub fn handler(&self) -> &LookupHandler<P, C> {
        &self.handler
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Blocking form of [`LookupHandler::lookup`]
    pub fn lookup<R, E, F>(&self, call: &Invocation, invoke: F) -> Result<R, E>
    where
        R: Cacheable,
        E: Cacheable,
        F: FnOnce() -> Result<R, E> + Send + 'static,
    {
        let Some(policy) = self.handler.active_policy(call) else {
            return invoke();
        };

        let cached = self
            .runtime
            .block_on(self.handler.cache().get::<R, E>(call, &policy));
        match self.handler.plan(call, cached, &policy) {
            Plan::Serve(value) => Ok(value),
            Plan::Replay(error) => Err(error),
            Plan::ServeStale(value) => {
                let loader = async move { tokio::task::spawn_blocking(invoke).await.ok() };
                self.handler
                    .refresh_in_background(call, policy, value.clone(), &self.runtime, loader);
                Ok(value)
            }
            Plan::Load => self.load(call, &policy, invoke),
        }
    }

    fn load<R, E, F>(&self, call: &Invocation, policy: &CachePolicy, invoke: F) -> Result<R, E>
    where
        R: Cacheable,
        E: Cacheable,
        F: FnOnce() -> Result<R, E>,
    {
        match self.handler.register::<R, E>(call) {
            Registration::Joined(handle) => match handle.wait_blocking() {
                Some(outcome) => outcome,
                None => {
                    debug!(method = %call.method, "in-flight call abandoned, calling through");
                    invoke()
                }
            },
            Registration::Bypass => invoke(),
            Registration::Leader(guard) => {
                let outcome = invoke();
                self.runtime
                    .block_on(self.handler.settle_load(call, policy, guard, outcome))
            }
        }
    }
}
