//! Cache providers: reading and writing call results against one logical key.

use crate::envelope::{CachedObject, Cacheable, Envelope};
use crate::fingerprint::fingerprint;
use crate::policy::CachePolicy;
use async_trait::async_trait;
use chrono::Utc;
use hoard_config::CacheSettings;
use hoard_core::{CacheStore, Invocation};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Backend-agnostic cache access for the lookup handler.
///
/// None of these operations fail from the caller's point of view: an
/// unreachable backend or an unreadable record reads as a miss, and a write
/// that cannot be completed is dropped.
#[async_trait]
pub trait CacheProvider: Send + Sync + 'static {
    async fn get<R: Cacheable, E: Cacheable>(
        &self,
        call: &Invocation,
        policy: &CachePolicy,
    ) -> CachedObject<R, E>;

    async fn store<R: Cacheable>(&self, call: &Invocation, policy: &CachePolicy, value: &R);

    async fn store_error<E: Cacheable>(&self, call: &Invocation, policy: &CachePolicy, error: &E);

    /// Remove whatever is cached for `call`
    async fn delete(&self, call: &Invocation) -> bool;
}

#[async_trait]
impl<C: CacheProvider> CacheProvider for Arc<C> {
    async fn get<R: Cacheable, E: Cacheable>(
        &self,
        call: &Invocation,
        policy: &CachePolicy,
    ) -> CachedObject<R, E> {
        (**self).get(call, policy).await
    }

    async fn store<R: Cacheable>(&self, call: &Invocation, policy: &CachePolicy, value: &R) {
        (**self).store(call, policy, value).await
    }

    async fn store_error<E: Cacheable>(&self, call: &Invocation, policy: &CachePolicy, error: &E) {
        (**self).store_error(call, policy, error).await
    }

    async fn delete(&self, call: &Invocation) -> bool {
        (**self).delete(call).await
    }
}

/// A provider writing gzipped JSON envelopes to a [`CacheStore`].
///
/// The store is usually a cluster client, but any single store works.
pub struct StoreCacheProvider<S> {
    store: S,
    salt: Option<String>,
}

impl<S: CacheStore> StoreCacheProvider<S> {
    pub fn new(store: S) -> Self {
        Self { store, salt: None }
    }

    /// A provider using the configured key salt, if any
    pub fn from_settings(store: S, settings: &CacheSettings) -> Self {
        match &settings.key_salt {
            Some(salt) => Self::new(store).with_salt(salt.as_str()),
            None => Self::new(store),
        }
    }

    /// Mix `salt` into every key, invalidating everything written under another salt
    #[must_use]
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        let salt = salt.into();
        self.salt = (!salt.is_empty()).then_some(salt);
        self
    }

    pub fn backend(&self) -> &S {
        &self.store
    }

    pub fn key_for(&self, call: &Invocation) -> String {
        fingerprint(call, self.salt.as_deref())
    }

    async fn write<R, E>(&self, call: &Invocation, policy: &CachePolicy, envelope: Envelope<R, E>)
    where
        R: Serialize + Send,
        E: Serialize + Send,
    {
        let key = self.key_for(call);
        let encoded = envelope.encode(&key);
        drop(envelope);
        let bytes = match encoded {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(method = %call.method, error = %err, "could not encode cache entry");
                return;
            }
        };
        if let Err(err) = self.store.set(&key, bytes, policy.ttl()).await {
            warn!(method = %call.method, error = %err, "cache write dropped");
        }
    }
}

#[async_trait]
impl<S: CacheStore> CacheProvider for StoreCacheProvider<S> {
    async fn get<R: Cacheable, E: Cacheable>(
        &self,
        call: &Invocation,
        policy: &CachePolicy,
    ) -> CachedObject<R, E> {
        let key = self.key_for(call);
        let bytes = match self.store.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return CachedObject::None,
            Err(err) => {
                warn!(method = %call.method, error = %err, "cache read failed, treating as miss");
                return CachedObject::None;
            }
        };
        match Envelope::<R, E>::decode(&key, &bytes) {
            Ok(envelope) => envelope.state(policy, Utc::now()),
            Err(err) => {
                debug!(method = %call.method, error = %err, "unreadable cache entry, treating as miss");
                CachedObject::None
            }
        }
    }

    async fn store<R: Cacheable>(&self, call: &Invocation, policy: &CachePolicy, value: &R) {
        let envelope: Envelope<&R, ()> = Envelope::value(value, Utc::now());
        self.write(call, policy, envelope).await;
    }

    async fn store_error<E: Cacheable>(&self, call: &Invocation, policy: &CachePolicy, error: &E) {
        let envelope: Envelope<(), &E> = Envelope::error(error, Utc::now());
        self.write(call, policy, envelope).await;
    }

    async fn delete(&self, call: &Invocation) -> bool {
        let key = self.key_for(call);
        match self.store.delete(&key).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!(method = %call.method, error = %err, "cache delete failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as TimeDelta;
    use hoard_core::{MemoryStore, MethodId, Value};
    use std::time::Duration;

    fn call(n: i32) -> Invocation {
        let method = MethodId::new("Calculator", "square").param("i32");
        Invocation::new(Arc::new(method), vec![Value::from(n)])
    }

    fn policy() -> CachePolicy {
        CachePolicy::builder()
            .cache_for(Duration::from_secs(10))
            .expire_after(Duration::from_secs(60))
            .cache_errors_for(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_store_then_get_is_fresh() {
        let provider = StoreCacheProvider::new(MemoryStore::default());
        provider.store(&call(3), &policy(), &9i64).await;

        let found: CachedObject<i64, String> = provider.get(&call(3), &policy()).await;
        assert_eq!(found, CachedObject::Fresh(9));

        let other: CachedObject<i64, String> = provider.get(&call(4), &policy()).await;
        assert_eq!(other, CachedObject::None);
    }

    #[tokio::test]
    async fn test_backdated_entry_reads_stale() {
        let provider = StoreCacheProvider::new(MemoryStore::default());
        let key = provider.key_for(&call(3));
        let old: Envelope<i64, String> = Envelope::value(9, Utc::now() - TimeDelta::seconds(30));
        provider
            .backend()
            .set(&key, old.encode(&key).unwrap(), None)
            .await
            .unwrap();

        let found: CachedObject<i64, String> = provider.get(&call(3), &policy()).await;
        assert_eq!(found, CachedObject::Stale(9));
    }

    #[tokio::test]
    async fn test_error_is_replayed() {
        let provider = StoreCacheProvider::new(MemoryStore::default());
        provider
            .store_error(&call(3), &policy(), &"overflow".to_string())
            .await;

        let found: CachedObject<i64, String> = provider.get(&call(3), &policy()).await;
        assert_eq!(found, CachedObject::Error("overflow".to_string()));
    }

    #[tokio::test]
    async fn test_garbage_reads_as_miss() {
        let provider = StoreCacheProvider::new(MemoryStore::default());
        let key = provider.key_for(&call(3));
        provider
            .backend()
            .set(&key, b"not gzip".to_vec(), None)
            .await
            .unwrap();

        let found: CachedObject<i64, String> = provider.get(&call(3), &policy()).await;
        assert_eq!(found, CachedObject::None);
    }

    #[tokio::test]
    async fn test_type_mismatch_reads_as_miss() {
        let provider = StoreCacheProvider::new(MemoryStore::default());
        provider.store(&call(3), &policy(), &"nine".to_string()).await;

        let found: CachedObject<i64, String> = provider.get(&call(3), &policy()).await;
        assert_eq!(found, CachedObject::None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_carry_max_age_as_ttl() {
        let provider = StoreCacheProvider::new(MemoryStore::default());
        provider.store(&call(3), &policy(), &9i64).await;
        assert_eq!(provider.backend().len(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        let raw = provider.backend().get(&provider.key_for(&call(3))).await.unwrap();
        assert!(raw.is_none());
    }

    #[tokio::test]
    async fn test_salt_separates_keyspaces() {
        let store = Arc::new(MemoryStore::default());
        let plain = StoreCacheProvider::new(Arc::clone(&store));
        let salted = StoreCacheProvider::new(Arc::clone(&store)).with_salt("v2");

        plain.store(&call(3), &policy(), &9i64).await;
        let found: CachedObject<i64, String> = salted.get(&call(3), &policy()).await;
        assert_eq!(found, CachedObject::None);
        assert_ne!(plain.key_for(&call(3)), salted.key_for(&call(3)));
    }

    #[test]
    fn test_salt_from_settings() {
        let salted = CacheSettings {
            key_salt: Some("v2".to_string()),
            ..CacheSettings::default()
        };
        let from_settings = StoreCacheProvider::from_settings(MemoryStore::default(), &salted);
        let explicit = StoreCacheProvider::new(MemoryStore::default()).with_salt("v2");
        assert_eq!(from_settings.key_for(&call(3)), explicit.key_for(&call(3)));

        let plain =
            StoreCacheProvider::from_settings(MemoryStore::default(), &CacheSettings::default());
        assert_eq!(plain.key_for(&call(3)), fingerprint(&call(3), None));
    }

    #[tokio::test]
    async fn test_delete() {
        let provider = StoreCacheProvider::new(MemoryStore::default());
        provider.store(&call(3), &policy(), &9i64).await;
        assert!(provider.delete(&call(3)).await);
        assert!(!provider.delete(&call(3)).await);
    }
}
