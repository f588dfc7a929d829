use super::{CacheStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Slot {
    bytes: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// An in-process store, useful for single-node deployments and tests.
///
/// An entry past its TTL is dropped when it is read. Entries nobody reads
/// again are swept on write once per sweep interval, or on a timer with
/// [`spawn_sweeper`](Self::spawn_sweeper).
pub struct MemoryStore {
    endpoint: String,
    entries: DashMap<String, Slot>,
    created: Instant,
    sweep_interval: Duration,
    /// Milliseconds after `created` at which the next write sweeps
    next_sweep: AtomicU64,
}

impl MemoryStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            entries: DashMap::new(),
            created: Instant::now(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            next_sweep: AtomicU64::new(millis(DEFAULT_SWEEP_INTERVAL)),
        }
    }

    /// How often writes sweep expired entries. Zero turns the sweep on write
    /// off.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self.next_sweep = AtomicU64::new(millis(interval));
        self
    }

    /// Number of entries held, including expired ones not swept yet
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry and return how many went
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, slot| !slot.is_expired(now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(endpoint = %self.endpoint, purged, "swept expired entries");
        }
        purged
    }

    /// Sweep expired entries every `period` until the store is dropped.
    ///
    /// Returns `None` for a zero period. Must be called inside a tokio
    /// runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> Option<JoinHandle<()>> {
        if period.is_zero() {
            return None;
        }
        let store: Weak<Self> = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match store.upgrade() {
                    Some(store) => {
                        store.purge_expired();
                    }
                    None => break,
                }
            }
        }))
    }

    fn sweep_if_due(&self, now: Instant) {
        if self.sweep_interval.is_zero() {
            return;
        }
        let elapsed = millis(now.saturating_duration_since(self.created));
        let due = self.next_sweep.load(Ordering::Relaxed);
        if elapsed < due {
            return;
        }
        let next = elapsed.saturating_add(millis(self.sweep_interval));
        if self
            .next_sweep
            .compare_exchange(due, next, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.purge_expired();
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = Instant::now();
        if let Some(slot) = self.entries.get(key) {
            if !slot.is_expired(now) {
                return Ok(Some(slot.bytes.clone()));
            }
        }
        self.entries.remove_if(key, |_, slot| slot.is_expired(now));
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let now = Instant::now();
        self.sweep_if_due(now);
        let expires_at = ttl.map(|ttl| now + ttl);
        self.entries.insert(
            key.to_string(),
            Slot {
                bytes: value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove(key).is_some())
    }
}
