//! Core call model, errors, and backend store contract for `hoard`.
//!
//! This crate holds the vocabulary shared by every other crate in the
//! workspace. Nothing here knows about policies, rings, or lookups; it only
//! describes what a call looks like and what a backend store must offer.
//!
//! ## Key Components
//!
//! - **`errors`**: The primary `Error` enum and `Result` alias used for
//!   configuration and codec failures.
//! - **`types`**: The call model: argument [`Value`]s, [`MethodId`],
//!   [`Invocation`] and the [`CallKey`] used for coalescing.
//! - **`store`**: The [`CacheStore`] trait every backend implements, the
//!   [`StoreError`] taxonomy that drives failover, and an in-memory store.

pub mod errors;
pub mod store;
pub mod types;

pub use self::{
    errors::{Error, Result, ResultExt},
    store::{CacheStore, MemoryStore, StoreError, StoreErrorKind},
    types::*,
};
