//! Cluster client: ring routing, failover and dead-node probing.

use crate::ring::{HashRing, RingMember, DEFAULT_VIRTUAL_NODES};
use async_trait::async_trait;
use hoard_config::ClusterSettings;
use hoard_core::{CacheStore, Error, Result, StoreError};
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};


/// One backend node and whether it is currently believed reachable
struct Node<S> {
    store: Arc<S>,
    alive: AtomicBool,
}

impl<S: CacheStore> RingMember for Arc<Node<S>> {
    fn ring_id(&self) -> &str {
        self.store.endpoint()
    }
}

type Ring<S> = HashRing<Arc<Node<S>>>;

struct ClusterInner<S> {
    nodes: Vec<Arc<Node<S>>>,
    ring: RwLock<Arc<Ring<S>>>,
    /// Serializes rebuilds so the last swap always reflects the latest flags
    rebuild: Mutex<()>,
    virtual_nodes: usize,
}

/// Point-in-time view of node health
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterStats {
    pub alive: Vec<String>,
    pub dead: Vec<String>,
}

/// Spreads keys over a set of backend stores and routes around dead ones.
///
/// Every node starts alive. A connectivity failure marks the node dead and
/// rebuilds the ring from the survivors; the operation is then retried on
/// whichever node now owns the key. Dead nodes are only brought back by
/// [`probe_dead_nodes`](Self::probe_dead_nodes), usually driven by
/// [`spawn_health_probe`](Self::spawn_health_probe).
pub struct ClusterClient<S> {
    inner: Arc<ClusterInner<S>>,
}

impl<S> Clone for ClusterClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: CacheStore> ClusterClient<S> {
    pub fn new(stores: Vec<S>) -> Self {
        Self::with_virtual_nodes(stores, DEFAULT_VIRTUAL_NODES)
    }

    pub fn with_virtual_nodes(stores: Vec<S>, virtual_nodes: usize) -> Self {
        let nodes: Vec<Arc<Node<S>>> = stores
            .into_iter()
            .map(|store| {
                Arc::new(Node {
                    store: Arc::new(store),
                    alive: AtomicBool::new(true),
                })
            })
            .collect();
        let ring = HashRing::build(nodes.clone(), virtual_nodes);

        Self {
            inner: Arc::new(ClusterInner {
                nodes,
                ring: RwLock::new(Arc::new(ring)),
                rebuild: Mutex::new(()),
                virtual_nodes,
            }),
        }
    }

    /// Build a client from settings, connecting each endpoint with `connect`
    pub fn from_settings<F>(settings: &ClusterSettings, connect: F) -> Result<Self>
    where
        F: Fn(&str) -> S,
    {
        if settings.endpoints.is_empty() {
            return Err(Error::configuration("cluster has no endpoints"));
        }
        if settings.virtual_nodes == 0 {
            return Err(Error::configuration("virtual_nodes must be positive"));
        }
        let stores = settings.endpoints.iter().map(|e| connect(e)).collect();
        Ok(Self::with_virtual_nodes(stores, settings.virtual_nodes as usize))
    }

    /// Run `op` against the node owning `key`, failing over on connectivity errors.
    ///
    /// Returns `None` when no alive node is left to try. Errors other than
    /// connectivity failures are returned as-is and leave the node alive.
    pub async fn execute<T, F, Fut>(
        &self,
        key: &str,
        op: F,
    ) -> Option<std::result::Result<T, StoreError>>
    where
        F: Fn(Arc<S>) -> Fut,
        Fut: Future<Output = std::result::Result<T, StoreError>>,
    {
        for _ in 0..self.inner.nodes.len() {
            let node = self.route(key)?;
            match op(Arc::clone(&node.store)).await {
                Ok(value) => return Some(Ok(value)),
                Err(err) if err.is_connectivity() => self.mark_dead(&node, &err),
                Err(err) => return Some(Err(err)),
            }
        }
        None
    }

    fn route(&self, key: &str) -> Option<Arc<Node<S>>> {
        let ring = Arc::clone(&self.inner.ring.read());
        ring.route(key).cloned()
    }

    /// Endpoint currently owning `key`
    pub fn endpoint_for(&self, key: &str) -> Option<String> {
        self.route(key).map(|node| node.store.endpoint().to_string())
    }

    fn mark_dead(&self, node: &Node<S>, err: &StoreError) {
        if node.alive.swap(false, Ordering::AcqRel) {
            warn!(endpoint = node.store.endpoint(), error = %err, "marking cache node dead");
            self.rebuild_ring();
        }
    }

    fn rebuild_ring(&self) {
        let _guard = self.inner.rebuild.lock();
        let alive: Vec<Arc<Node<S>>> = self
            .inner
            .nodes
            .iter()
            .filter(|node| node.alive.load(Ordering::Acquire))
            .cloned()
            .collect();
        let count = alive.len();
        let ring = Arc::new(HashRing::build(alive, self.inner.virtual_nodes));
        *self.inner.ring.write() = ring;
        debug!(alive = count, total = self.inner.nodes.len(), "rebuilt hash ring");
    }

    /// Probe every dead node once, reviving the ones that answer.
    ///
    /// Returns how many nodes came back.
    pub async fn probe_dead_nodes(&self) -> usize {
        let mut revived = 0;
        for node in &self.inner.nodes {
            if node.alive.load(Ordering::Acquire) {
                continue;
            }
            match node.store.probe().await {
                Ok(()) => {
                    if !node.alive.swap(true, Ordering::AcqRel) {
                        info!(endpoint = node.store.endpoint(), "cache node is back");
                        revived += 1;
                    }
                }
                Err(err) => {
                    debug!(endpoint = node.store.endpoint(), error = %err, "cache node still dead");
                }
            }
        }
        if revived > 0 {
            self.rebuild_ring();
        }
        revived
    }

    /// Probe dead nodes every `period` until `shutdown` fires
    pub fn spawn_health_probe(
        &self,
        period: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; every node starts alive.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        client.probe_dead_nodes().await;
                    }
                    _ = shutdown.recv() => {
                        debug!("cluster health probe shutting down");
                        break;
                    }
                }
            }
        })
    }

    pub fn stats(&self) -> ClusterStats {
        let mut stats = ClusterStats::default();
        for node in &self.inner.nodes {
            let endpoint = node.store.endpoint().to_string();
            if node.alive.load(Ordering::Acquire) {
                stats.alive.push(endpoint);
            } else {
                stats.dead.push(endpoint);
            }
        }
        stats
    }
}

#[async_trait]
impl<S: CacheStore> CacheStore for ClusterClient<S> {
    fn endpoint(&self) -> &str {
        "cluster"
    }

    async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, StoreError> {
        self.execute(key, |store| async move { store.get(key).await })
            .await
            .unwrap_or(Ok(None))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> std::result::Result<(), StoreError> {
        let outcome = self
            .execute(key, |store| {
                let value = value.clone();
                async move { store.set(key, value, ttl).await }
            })
            .await;
        match outcome {
            Some(result) => result,
            None => {
                debug!(key, "no alive cache node, dropping write");
                Ok(())
            }
        }
    }

    async fn delete(&self, key: &str) -> std::result::Result<bool, StoreError> {
        self.execute(key, |store| async move { store.delete(key).await })
            .await
            .unwrap_or(Ok(false))
    }

    async fn probe(&self) -> std::result::Result<(), StoreError> {
        if self.stats().alive.is_empty() {
            Err(StoreError::connectivity("cluster", "no alive nodes"))
        } else {
            Ok(())
        }
    }
}
