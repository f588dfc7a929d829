//! The persisted cache record and how freshness is read from it.

use crate::policy::CachePolicy;
use chrono::{DateTime, Utc};
use hoard_core::{Error, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Types that can travel through the cache, as results or as failures.
pub trait Cacheable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// What a cache read found
#[derive(Debug, Clone, PartialEq)]
pub enum CachedObject<R, E> {
    None,
    Fresh(R),
    Stale(R),
    /// A failure of the real call, still within its replay window
    Error(E),
}

/// The record written to a backend store.
///
/// Freshness is not stored; it is derived from `created_at` and the policy in
/// force when the record is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<R, E> {
    pub value: Option<R>,
    pub is_error: bool,
    pub error: Option<E>,
    pub created_at: DateTime<Utc>,
}

impl<R, E> Envelope<R, E> {
    pub fn value(value: R, created_at: DateTime<Utc>) -> Self {
        Self {
            value: Some(value),
            is_error: false,
            error: None,
            created_at,
        }
    }

    pub fn error(error: E, created_at: DateTime<Utc>) -> Self {
        Self {
            value: None,
            is_error: true,
            error: Some(error),
            created_at,
        }
    }

    /// Classify this record as of `now`
    pub fn state(self, policy: &CachePolicy, now: DateTime<Utc>) -> CachedObject<R, E> {
        // Records from a clock ahead of ours count as brand new.
        let age = (now - self.created_at).to_std().unwrap_or_default();

        if self.is_error {
            return match self.error {
                Some(error) if age < policy.exception_cache_duration => CachedObject::Error(error),
                _ => CachedObject::None,
            };
        }
        if !policy.max_age.is_zero() && age >= policy.max_age {
            return CachedObject::None;
        }
        match self.value {
            Some(value) if age < policy.cache_duration => CachedObject::Fresh(value),
            Some(value) => CachedObject::Stale(value),
            None => CachedObject::None,
        }
    }
}

impl<R: Serialize, E: Serialize> Envelope<R, E> {
    /// JSON, gzipped
    pub fn encode(&self, key: &str) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self)
            .map_err(|e| Error::serialization_with_source(key, "encoding envelope", e))?;
        hoard_utils::compress(&json)
    }
}

impl<R: DeserializeOwned, E: DeserializeOwned> Envelope<R, E> {
    pub fn decode(key: &str, bytes: &[u8]) -> Result<Self> {
        let json = hoard_utils::decompress(bytes)?;
        serde_json::from_slice(&json)
            .map_err(|e| Error::serialization_with_source(key, "decoding envelope", e))
    }
}
