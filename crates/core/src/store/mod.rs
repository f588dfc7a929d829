//! The contract every backend key-value store satisfies.
//!
//! A store moves opaque bytes under string keys. Encoding, fingerprints and
//! freshness all live above this layer; the store only needs to say whether
//! a failure means the node is unreachable (so the cluster can fail over)
//! or something else went wrong.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Key read by [`CacheStore::probe`] to test whether a node answers at all
pub const PROBE_KEY: &str = "query-aliveness";

/// Broad classification of a store failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The node could not be reached, or the connection dropped
    Connectivity,
    /// The node answered with something the client could not understand
    Protocol,
    /// The node refused the operation
    Rejected,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreErrorKind::Connectivity => write!(f, "connectivity failure"),
            StoreErrorKind::Protocol => write!(f, "protocol error"),
            StoreErrorKind::Rejected => write!(f, "operation rejected"),
        }
    }
}

/// A failure reported by a backend store
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} on {endpoint}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub endpoint: String,
    pub message: String,
}

impl StoreError {
    pub fn new(
        kind: StoreErrorKind,
        endpoint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn connectivity(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Connectivity, endpoint, message)
    }

    pub fn protocol(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Protocol, endpoint, message)
    }

    /// Whether the node should be considered dead
    pub fn is_connectivity(&self) -> bool {
        self.kind == StoreErrorKind::Connectivity
    }
}

/// A remote (or local) key-value store holding opaque byte payloads.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Stable identifier of this node, used for ring placement and logs
    fn endpoint(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value`, letting the store drop it after `ttl` if one is given
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>)
        -> Result<(), StoreError>;

    /// Remove `key`, returning whether it was present
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Check that the node answers. A miss is a healthy answer.
    async fn probe(&self) -> Result<(), StoreError> {
        self.get(PROBE_KEY).await.map(|_| ())
    }
}

#[async_trait]
impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        (**self).set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        (**self).delete(key).await
    }

    async fn probe(&self) -> Result<(), StoreError> {
        (**self).probe().await
    }
}
