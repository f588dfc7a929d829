//! Routing cache keys across a cluster of backend nodes.
//!
//! ## Key Components
//!
//! - **`ring`**: A consistent hash ring with virtual nodes. Rings are
//!   immutable; membership changes build a new one.
//! - **`client`**: [`ClusterClient`] owns the nodes, tracks which ones are
//!   alive, fails over around dead ones and probes them back to life.
//!   It implements [`hoard_core::CacheStore`] so it can stand in for a
//!   single store anywhere.

pub mod client;
pub mod ring;

pub use client::{ClusterClient, ClusterStats};
pub use ring::{HashRing, RingMember, DEFAULT_VIRTUAL_NODES};
