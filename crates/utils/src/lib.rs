//! Shared utilities for hoard
//!
//! This crate provides the small pieces of plumbing used across the
//! workspace that do not belong to any single layer.
//!
//! ## Key Components
//!
//! - **`tracing`**: Subscriber setup for binaries and tests embedding hoard.
//! - **`compression`**: Gzip framing for cache payloads.

pub mod compression;
pub mod tracing;

pub use compression::{compress, decompress};
