//! Merging concurrent identical requests.
//!
//! The first caller for a [`CallKey`] becomes the leader and receives an
//! [`InflightGuard`]; everyone arriving while it is registered receives an
//! [`InflightHandle`] onto the leader's outcome. The guard removes the
//! registration when it settles or is dropped, so a cancelled leader never
//! leaves joiners waiting forever.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use hoard_core::CallKey;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

type Outcome<R, E> = Result<R, E>;
type SharedOutcome<R, E> = Shared<BoxFuture<'static, Option<Outcome<R, E>>>>;

struct InflightEntry {
    id: u64,
    /// A `SharedOutcome<R, E>` for the result type of the registered call
    outcome: Box<dyn Any + Send + Sync>,
}

/// The in-flight registry
#[derive(Clone, Default)]
pub struct RequestCoalescer {
    entries: Arc<DashMap<CallKey, InflightEntry>>,
    next_id: Arc<AtomicU64>,
}

/// Result of [`RequestCoalescer::try_join_or_register`]
pub enum Registration<R, E> {
    /// Someone else is already running this call
    Joined(InflightHandle<R, E>),
    /// This caller now owns the call and must settle the guard
    Leader(InflightGuard<R, E>),
    /// The key is in flight with a different result type; run uncoalesced
    Bypass,
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight call for `key`, or register as its leader.
    ///
    /// Check and insert happen under the map's entry lock, so exactly one of
    /// any number of concurrent callers becomes the leader.
    pub fn try_join_or_register<R, E>(&self, key: CallKey) -> Registration<R, E>
    where
        R: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        match self.entries.entry(key) {
            Entry::Occupied(occupied) => {
                match occupied.get().outcome.downcast_ref::<SharedOutcome<R, E>>() {
                    Some(outcome) => Registration::Joined(InflightHandle {
                        outcome: outcome.clone(),
                    }),
                    None => {
                        warn!(
                            method = %occupied.key().method,
                            "in-flight call has a different result type, not coalescing"
                        );
                        Registration::Bypass
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let (sender, receiver) = oneshot::channel::<Outcome<R, E>>();
                let outcome: SharedOutcome<R, E> = receiver.map(Result::ok).boxed().shared();
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let key = vacant.key().clone();
                vacant.insert(InflightEntry {
                    id,
                    outcome: Box::new(outcome),
                });
                Registration::Leader(InflightGuard {
                    entries: Arc::clone(&self.entries),
                    key,
                    id,
                    sender: Some(sender),
                })
            }
        }
    }

    pub fn is_in_flight(&self, key: &CallKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of calls currently in flight
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A joiner's view of the leader's outcome
pub struct InflightHandle<R, E> {
    outcome: SharedOutcome<R, E>,
}

impl<R, E> InflightHandle<R, E>
where
    R: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// The leader's outcome, or `None` if the leader went away without one
    pub async fn wait(self) -> Option<Outcome<R, E>> {
        self.outcome.await
    }

    /// Blocking form of [`wait`](Self::wait), for callers outside any runtime
    pub fn wait_blocking(self) -> Option<Outcome<R, E>> {
        futures::executor::block_on(self.outcome)
    }
}

/// The leader's registration. Settle it with the outcome of the call;
/// dropping it unsettled releases joiners with no outcome.
pub struct InflightGuard<R, E> {
    entries: Arc<DashMap<CallKey, InflightEntry>>,
    key: CallKey,
    id: u64,
    sender: Option<oneshot::Sender<Outcome<R, E>>>,
}

impl<R, E> InflightGuard<R, E> {
    pub fn key(&self) -> &CallKey {
        &self.key
    }

    /// Release the registration and hand `outcome` to every joiner
    pub fn settle(mut self, outcome: Outcome<R, E>) {
        self.release();
        if let Some(sender) = self.sender.take() {
            // Nobody joined.
            let _ = sender.send(outcome);
        }
    }

    fn release(&self) {
        let id = self.id;
        self.entries.remove_if(&self.key, |_, entry| entry.id == id);
    }
}

impl<R, E> Drop for InflightGuard<R, E> {
    fn drop(&mut self) {
        self.release();
    }
}
