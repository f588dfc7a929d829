//! Resolving a call to the policy that governs it.
//!
//! Configured methods are checked in registration order. A configured
//! method matches when its identity equals the called method exactly
//! (overloads are distinct) and every parameter predicate accepts the
//! corresponding argument. The first match wins; when nothing matches the
//! default policy applies, if there is one.

use crate::policy::{CachePolicy, PolicyBuilder};
use hoard_config::CacheSettings;
use hoard_core::{Error, MethodId, Result, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Maps a call to its cache policy
pub trait PolicyProvider: Send + Sync + 'static {
    /// `None`, or a policy with a zero cache duration, means "do not cache"
    fn policy_for(&self, method: &MethodId, args: &[Value]) -> Option<CachePolicy>;
}

impl<P: PolicyProvider + ?Sized> PolicyProvider for Arc<P> {
    fn policy_for(&self, method: &MethodId, args: &[Value]) -> Option<CachePolicy> {
        (**self).policy_for(method, args)
    }
}

/// One end of a range predicate
#[derive(Clone)]
pub enum Bound {
    Fixed(Value),
    /// Produced afresh on every match, for windows like "the last two hours"
    Deferred(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl Bound {
    pub fn deferred<F>(producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Bound::Deferred(Arc::new(producer))
    }

    fn resolve(&self) -> Value {
        match self {
            Bound::Fixed(value) => value.clone(),
            Bound::Deferred(producer) => producer(),
        }
    }
}

impl fmt::Debug for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Bound::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// A predicate over one argument
#[derive(Debug, Clone)]
pub enum Param {
    Any,
    /// Equal to the value. Numbers match by magnitude across integer and
    /// float variants, so `is(1)` accepts a `u32` or `f64` 1.
    Exact(Value),
    /// Inclusive on both ends
    Between(Bound, Bound),
}

impl Param {
    pub fn any() -> Self {
        Param::Any
    }

    pub fn is(value: impl Into<Value>) -> Self {
        Param::Exact(value.into())
    }

    pub fn between(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Param::Between(Bound::Fixed(low.into()), Bound::Fixed(high.into()))
    }

    pub fn between_bounds(low: Bound, high: Bound) -> Self {
        Param::Between(low, high)
    }

    pub fn accepts(&self, arg: &Value) -> bool {
        match self {
            Param::Any => true,
            Param::Exact(expected) => {
                expected == arg
                    || (expected.is_number() && arg.compare(expected) == Some(Ordering::Equal))
            }
            Param::Between(low, high) => {
                let above = matches!(
                    arg.compare(&low.resolve()),
                    Some(Ordering::Greater | Ordering::Equal)
                );
                above
                    && matches!(
                        arg.compare(&high.resolve()),
                        Some(Ordering::Less | Ordering::Equal)
                    )
            }
        }
    }
}

/// A method, the predicates its arguments must satisfy, and the policy that
/// applies when they do
#[derive(Debug, Clone)]
pub struct ConfiguredMethod {
    pub method: MethodId,
    pub params: Vec<Param>,
    pub policy: CachePolicy,
}

impl ConfiguredMethod {
    pub fn matches(&self, method: &MethodId, args: &[Value]) -> bool {
        self.method == *method
            && self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| param.accepts(arg))
    }
}

/// Policy provider backed by an ordered list of configured methods
#[derive(Debug, Clone, Default)]
pub struct ConfiguredPolicyProvider {
    methods: Vec<ConfiguredMethod>,
    default: Option<CachePolicy>,
}

impl ConfiguredPolicyProvider {
    pub fn builder() -> PolicyProviderBuilder {
        PolicyProviderBuilder::default()
    }

    pub fn methods(&self) -> &[ConfiguredMethod] {
        &self.methods
    }

    pub fn default_policy(&self) -> Option<&CachePolicy> {
        self.default.as_ref()
    }
}

impl PolicyProvider for ConfiguredPolicyProvider {
    fn policy_for(&self, method: &MethodId, args: &[Value]) -> Option<CachePolicy> {
        self.methods
            .iter()
            .find(|configured| configured.matches(method, args))
            .map(|configured| configured.policy)
            .or(self.default)
    }
}

/// Collects configuration and reports the first invalid entry on `build`
#[derive(Debug, Default)]
pub struct PolicyProviderBuilder {
    methods: Vec<ConfiguredMethod>,
    default: Option<CachePolicy>,
    error: Option<Error>,
}

impl PolicyProviderBuilder {
    /// Policy for calls no configured method matches
    #[must_use]
    pub fn default_is<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(PolicyBuilder) -> PolicyBuilder,
    {
        match configure(PolicyBuilder::default()).build() {
            Ok(policy) => self.default = Some(policy),
            Err(err) => self.record(err),
        }
        self
    }

    /// Use cache-wide settings as the default policy
    #[must_use]
    pub fn defaults_from(self, settings: &CacheSettings) -> Self {
        self.default_is(|_| PolicyBuilder::from_settings(settings))
    }

    /// Register a method with one predicate per parameter
    #[must_use]
    pub fn method<I, F>(mut self, method: MethodId, params: I, configure: F) -> Self
    where
        I: IntoIterator<Item = Param>,
        F: FnOnce(PolicyBuilder) -> PolicyBuilder,
    {
        let params: Vec<Param> = params.into_iter().collect();
        if params.len() != method.arity() {
            self.record(Error::configuration(format!(
                "{method} takes {} arguments but {} predicates were given",
                method.arity(),
                params.len()
            )));
            return self;
        }
        match configure(PolicyBuilder::default()).build() {
            Ok(policy) => self.methods.push(ConfiguredMethod {
                method,
                params,
                policy,
            }),
            Err(err) => self.record(Error::configuration(format!("{method}: {err}"))),
        }
        self
    }

    fn record(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    pub fn build(self) -> Result<ConfiguredPolicyProvider> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(ConfiguredPolicyProvider {
            methods: self.methods,
            default: self.default,
        })
    }
}
