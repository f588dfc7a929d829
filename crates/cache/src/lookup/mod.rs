//! The lookup state machine.
//!
//! For every intercepted call the handler resolves a policy, reads the cache
//! and picks one of four outcomes:
//!
//! - **fresh**: answer from the cache
//! - **error**: replay the cached failure without calling through
//! - **stale**: answer from the cache now and refresh in the background,
//!   unless a refresh for the same call is already running
//! - **miss**: run the real call, or join the identical call already in
//!   flight, then write the outcome back
//!
//! [`LookupHandler`] drives this for async callers; [`SyncLookupHandler`]
//! wraps it for callers on plain threads.

mod blocking;
mod refresh;

#[cfg(test)]
mod tests;

pub use blocking::SyncLookupHandler;

use crate::coalescer::{InflightGuard, Registration, RequestCoalescer};
use crate::envelope::{CachedObject, Cacheable};
use crate::matcher::PolicyProvider;
use crate::policy::CachePolicy;
use crate::provider::CacheProvider;
use crate::stats::{LookupStats, LookupStatsSnapshot};
use hoard_core::Invocation;
use refresh::RefreshTracker;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn, Instrument};

/// What to do after reading the cache
pub(crate) enum Plan<R, E> {
    Serve(R),
    Replay(E),
    ServeStale(R),
    Load,
}

struct LookupInner<P, C> {
    policies: P,
    cache: C,
    coalescer: RequestCoalescer,
    stats: LookupStats,
    refreshes: Arc<RefreshTracker>,
}

/// Async lookup handler. Cheap to clone; clones share the in-flight
/// registry, the statistics and the pending refreshes.
pub struct LookupHandler<P, C> {
    inner: Arc<LookupInner<P, C>>,
}

impl<P, C> Clone for LookupHandler<P, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: PolicyProvider, C: CacheProvider> LookupHandler<P, C> {
    pub fn new(policies: P, cache: C) -> Self {
        Self {
            inner: Arc::new(LookupInner {
                policies,
                cache,
                coalescer: RequestCoalescer::new(),
                stats: LookupStats::default(),
                refreshes: Arc::new(RefreshTracker::default()),
            }),
        }
    }

    pub fn policies(&self) -> &P {
        &self.inner.policies
    }

    pub fn cache(&self) -> &C {
        &self.inner.cache
    }

    pub fn stats(&self) -> LookupStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Calls currently running on behalf of waiting callers, refreshes included
    pub fn in_flight(&self) -> usize {
        self.inner.coalescer.len()
    }

    /// Background refreshes still running
    pub fn pending_refreshes(&self) -> usize {
        self.inner.refreshes.active()
    }

    /// Wait until every background refresh started so far has written its
    /// outcome back.
    pub async fn settle_refreshes(&self) {
        self.inner.refreshes.settled().await;
    }

    /// Drop whatever is cached for `call`
    pub async fn invalidate(&self, call: &Invocation) -> bool {
        let removed = self.inner.cache.delete(call).await;
        debug!(method = %call.method, removed, "invalidated cache entry");
        removed
    }

    /// Serve `call` from the cache where the policy allows it, calling
    /// `invoke` for the real result otherwise.
    ///
    /// A failure of the real call is returned as-is and may be replayed to
    /// later callers for the policy's error window. Cache and backend
    /// failures never surface here.
    ///
    /// Stale entries are refreshed on the current tokio runtime. Polled on
    /// any other executor, a stale entry is still served but not refreshed.
    pub async fn lookup<R, E, F, Fut>(&self, call: &Invocation, invoke: F) -> Result<R, E>
    where
        R: Cacheable,
        E: Cacheable,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let span = hoard_utils::tracing::lookup_span(&call.method);
        self.lookup_in_span(call, invoke).instrument(span).await
    }

    async fn lookup_in_span<R, E, F, Fut>(&self, call: &Invocation, invoke: F) -> Result<R, E>
    where
        R: Cacheable,
        E: Cacheable,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let Some(policy) = self.active_policy(call) else {
            return invoke().await;
        };

        let cached = self.inner.cache.get::<R, E>(call, &policy).await;
        match self.plan(call, cached, &policy) {
            Plan::Serve(value) => Ok(value),
            Plan::Replay(error) => Err(error),
            Plan::ServeStale(value) => {
                match Handle::try_current() {
                    Ok(runtime) => {
                        let loader = async move { Some(invoke().await) };
                        self.refresh_in_background(call, policy, value.clone(), &runtime, loader);
                    }
                    Err(_) => {
                        warn!(method = %call.method, "no tokio runtime, skipping background refresh");
                    }
                }
                Ok(value)
            }
            Plan::Load => match self.register::<R, E>(call) {
                Registration::Joined(handle) => match handle.wait().await {
                    Some(outcome) => outcome,
                    None => {
                        debug!(method = %call.method, "in-flight call abandoned, calling through");
                        invoke().await
                    }
                },
                Registration::Bypass => invoke().await,
                Registration::Leader(guard) => {
                    let outcome = invoke().await;
                    self.settle_load(call, &policy, guard, outcome).await
                }
            },
        }
    }

    /// The policy for `call`, or `None` when the call goes straight through
    pub(crate) fn active_policy(&self, call: &Invocation) -> Option<CachePolicy> {
        match self.inner.policies.policy_for(&call.method, &call.args) {
            Some(policy) if policy.is_enabled() => Some(policy),
            _ => {
                self.inner.stats.record_bypass();
                None
            }
        }
    }

    pub(crate) fn plan<R, E>(
        &self,
        call: &Invocation,
        cached: CachedObject<R, E>,
        policy: &CachePolicy,
    ) -> Plan<R, E> {
        let stats = &self.inner.stats;
        match cached {
            CachedObject::Fresh(value) => {
                debug!(method = %call.method, "fresh hit");
                stats.record_fresh_hit();
                Plan::Serve(value)
            }
            CachedObject::Error(error) => {
                debug!(method = %call.method, "replaying cached failure");
                stats.record_error_replay();
                Plan::Replay(error)
            }
            CachedObject::Stale(value) if !policy.discard_stale => {
                debug!(method = %call.method, "stale hit");
                stats.record_stale_hit();
                Plan::ServeStale(value)
            }
            CachedObject::Stale(_) | CachedObject::None => {
                debug!(method = %call.method, "miss");
                stats.record_miss();
                Plan::Load
            }
        }
    }

    /// Claim the in-flight slot for a miss
    pub(crate) fn register<R: Cacheable, E: Cacheable>(
        &self,
        call: &Invocation,
    ) -> Registration<R, E> {
        let registration = self.inner.coalescer.try_join_or_register(call.key());
        if matches!(registration, Registration::Joined(_)) {
            self.inner.stats.record_coalesced();
        }
        registration
    }

    /// Write the leader's outcome back, then hand it to the joiners
    pub(crate) async fn settle_load<R: Cacheable, E: Cacheable>(
        &self,
        call: &Invocation,
        policy: &CachePolicy,
        guard: InflightGuard<R, E>,
        outcome: Result<R, E>,
    ) -> Result<R, E> {
        match &outcome {
            Ok(value) => self.inner.cache.store(call, policy, value).await,
            Err(error) => self.inner.cache.store_error(call, policy, error).await,
        }
        guard.settle(outcome.clone());
        outcome
    }

    /// Start a detached refresh of a stale entry on `runtime`.
    ///
    /// Does nothing when the call is already in flight. A loader yielding
    /// `None` (it panicked or was cancelled) releases the slot without
    /// writing anything.
    pub(crate) fn refresh_in_background<R, E, L>(
        &self,
        call: &Invocation,
        policy: CachePolicy,
        stale: R,
        runtime: &Handle,
        loader: L,
    ) where
        R: Cacheable,
        E: Cacheable,
        L: Future<Output = Option<Result<R, E>>> + Send + 'static,
    {
        let guard = match self.inner.coalescer.try_join_or_register::<R, E>(call.key()) {
            Registration::Leader(guard) => guard,
            Registration::Joined(_) | Registration::Bypass => {
                debug!(method = %call.method, "refresh already running");
                return;
            }
        };

        let ticket = self.inner.refreshes.begin();
        let handler = self.clone();
        let call = call.clone();
        runtime.spawn(async move {
            let _ticket = ticket;
            match loader.await {
                Some(outcome) => handler.settle_refresh(&call, &policy, stale, guard, outcome).await,
                None => warn!(method = %call.method, "background refresh did not complete"),
            }
        });
    }

    async fn settle_refresh<R: Cacheable, E: Cacheable>(
        &self,
        call: &Invocation,
        policy: &CachePolicy,
        stale: R,
        guard: InflightGuard<R, E>,
        outcome: Result<R, E>,
    ) {
        let cache = &self.inner.cache;
        match &outcome {
            Ok(value) => cache.store(call, policy, value).await,
            Err(error) if policy.bubble_exceptions => {
                debug!(method = %call.method, "refresh failed, caching the failure");
                cache.store_error(call, policy, error).await;
            }
            Err(_) => {
                debug!(method = %call.method, "refresh failed, keeping the stale value");
                cache.store(call, policy, &stale).await;
            }
        }
        self.inner.stats.record_refresh(outcome.is_ok());
        guard.settle(outcome);
    }
}
