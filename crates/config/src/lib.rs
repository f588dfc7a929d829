//! Settings for hoard
//!
//! Settings are read once at startup from a JSON document, adjusted from
//! `HOARD_*` environment variables, and validated before anything is built
//! from them. After that they are plain immutable data.

pub mod overrides;
pub mod settings;


pub use overrides::{ENV_ENDPOINTS, ENV_KEY_SALT, ENV_PROBE_INTERVAL_SECS};
pub use settings::{CacheSettings, ClusterSettings, Settings};
