//! Transparent call caching for hoard
//!
//! A [`LookupHandler`] sits between a caller and the real implementation of
//! a service. For every intercepted call it resolves a [`CachePolicy`],
//! consults the [`CacheProvider`], and then either answers from the cache,
//! answers with stale data while refreshing in the background, replays a
//! cached failure, or runs the real call. Concurrent identical calls share a
//! single execution.
//!
//! ## Key Components
//!
//! - **`policy`**: Cache rules for a method family and their fluent builder.
//! - **`matcher`**: Ordered, predicate-based resolution of calls to policies.
//! - **`fingerprint`**: Deterministic storage keys derived from a call.
//! - **`envelope`**: The persisted record and freshness derivation.
//! - **`provider`**: The [`CacheProvider`] contract and its store-backed
//!   implementation.
//! - **`coalescer`**: The in-flight registry merging identical requests.
//! - **`lookup`**: The lookup state machine, async and blocking.
//! - **`service`**: [`CachedService`], the facade hand-written adapters use.
//! - **`stats`**: Lookup counters.

pub mod coalescer;
pub mod envelope;
pub mod fingerprint;
pub mod lookup;
pub mod matcher;
pub mod policy;
pub mod provider;
pub mod service;
pub mod stats;

pub use coalescer::{InflightGuard, InflightHandle, Registration, RequestCoalescer};
pub use envelope::{CachedObject, Cacheable, Envelope};
pub use fingerprint::fingerprint;
pub use lookup::{LookupHandler, SyncLookupHandler};
pub use matcher::{
    Bound, ConfiguredMethod, ConfiguredPolicyProvider, Param, PolicyProvider,
    PolicyProviderBuilder,
};
pub use policy::{CachePolicy, PolicyBuilder};
pub use provider::{CacheProvider, StoreCacheProvider};
pub use service::CachedService;
pub use stats::LookupStatsSnapshot;
