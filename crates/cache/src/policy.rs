//! Cache policies.

use hoard_config::CacheSettings;
use hoard_core::{Error, Result};
use std::time::Duration;

/// How calls of one method family are cached.
///
/// Built once during configuration and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Age at which a cached value turns stale. Zero disables caching.
    pub cache_duration: Duration,
    /// Age at which a cached value is gone for good. Zero means no hard
    /// expiry; otherwise never below `cache_duration`.
    pub max_age: Duration,
    /// How long a cached failure is replayed instead of calling through
    pub exception_cache_duration: Duration,
    /// When a background refresh of stale data fails: store the failure
    /// (`true`) or keep serving the old value (`false`)
    pub bubble_exceptions: bool,
    /// Treat stale values as misses
    pub discard_stale: bool,
}

impl CachePolicy {
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::default()
    }

    /// A policy that never caches
    pub fn disabled() -> Self {
        Self {
            cache_duration: Duration::ZERO,
            max_age: Duration::ZERO,
            exception_cache_duration: Duration::ZERO,
            bubble_exceptions: false,
            discard_stale: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.cache_duration.is_zero()
    }

    /// Time-to-live handed to the backend store
    pub fn ttl(&self) -> Option<Duration> {
        (!self.max_age.is_zero()).then_some(self.max_age)
    }
}

/// Fluent construction of a [`CachePolicy`].
///
/// ```
/// use hoard_cache::CachePolicy;
/// use std::time::Duration;
///
/// let policy = CachePolicy::builder()
///     .cache_for(Duration::from_secs(60))
///     .expire_after(Duration::from_secs(600))
///     .cache_errors_for(Duration::from_secs(5))
///     .build()
///     .unwrap();
/// assert_eq!(policy.ttl(), Some(Duration::from_secs(600)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PolicyBuilder {
    cache_duration: Duration,
    max_age: Option<Duration>,
    exception_cache_duration: Duration,
    bubble_exceptions: bool,
    discard_stale: bool,
}

impl PolicyBuilder {
    /// Start from cache-wide defaults
    pub fn from_settings(settings: &CacheSettings) -> Self {
        let mut builder = Self::default();
        if settings.default_cache_secs > 0 {
            builder = builder
                .cache_for(settings.default_cache_duration())
                .expire_after(settings.default_max_age());
        }
        builder
    }

    /// Serve cached values as fresh for `duration`.
    ///
    /// Also sets the hard expiry to `duration` unless one was given already,
    /// so a policy built from this alone never serves stale data.
    #[must_use]
    pub fn cache_for(mut self, duration: Duration) -> Self {
        self.cache_duration = duration;
        if self.max_age.map_or(true, |age| age.is_zero()) {
            self.max_age = Some(duration);
        }
        self
    }

    /// Replay failures of the real call for `duration`
    #[must_use]
    pub fn cache_errors_for(mut self, duration: Duration) -> Self {
        self.exception_cache_duration = duration;
        self
    }

    /// Drop cached values entirely once they reach `duration`
    #[must_use]
    pub fn expire_after(mut self, duration: Duration) -> Self {
        self.max_age = Some(duration);
        self
    }

    #[must_use]
    pub fn disable_cache(mut self) -> Self {
        self.cache_duration = Duration::ZERO;
        self
    }

    /// Keep serving the old value when a background refresh fails
    #[must_use]
    pub fn suppress_errors_when_stale(mut self) -> Self {
        self.bubble_exceptions = false;
        self
    }

    /// Store the failure when a background refresh fails
    #[must_use]
    pub fn bubble_errors_when_stale(mut self) -> Self {
        self.bubble_exceptions = true;
        self
    }

    #[must_use]
    pub fn discard_stale(mut self) -> Self {
        self.discard_stale = true;
        self
    }

    pub fn build(self) -> Result<CachePolicy> {
        let max_age = self.max_age.unwrap_or(Duration::ZERO);
        if !max_age.is_zero() && max_age < self.cache_duration {
            return Err(Error::configuration(format!(
                "expiry of {max_age:?} is shorter than the cache duration of {:?}",
                self.cache_duration
            )));
        }
        Ok(CachePolicy {
            cache_duration: self.cache_duration,
            max_age,
            exception_cache_duration: self.exception_cache_duration,
            bubble_exceptions: self.bubble_exceptions,
            discard_stale: self.discard_stale,
        })
    }
}
