//! Settings structures and loading

use hoard_core::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of ring points per node
pub const DEFAULT_VIRTUAL_NODES: u32 = 160;

/// Default interval between probes of dead nodes
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 10;

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub cluster: ClusterSettings,
    pub cache: CacheSettings,
}

/// Where the backend nodes are and how the client treats them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterSettings {
    /// Node endpoints in `host:port` form
    pub endpoints: Vec<String>,
    pub virtual_nodes: u32,
    pub probe_interval_secs: u64,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            virtual_nodes: DEFAULT_VIRTUAL_NODES,
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
        }
    }
}

impl ClusterSettings {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

/// Cache-wide defaults applied to methods without their own policy
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Extra text mixed into every storage key
    pub key_salt: Option<String>,
    /// Zero disables caching unless a method says otherwise
    pub default_cache_secs: u64,
    /// Zero means "same as the cache duration"
    pub default_max_age_secs: u64,
}

impl CacheSettings {
    pub fn default_cache_duration(&self) -> Duration {
        Duration::from_secs(self.default_cache_secs)
    }

    pub fn default_max_age(&self) -> Duration {
        if self.default_max_age_secs == 0 {
            self.default_cache_duration()
        } else {
            Duration::from_secs(self.default_max_age_secs)
        }
    }
}

impl Settings {
    /// Parse settings from a JSON document, apply environment overrides and validate
    pub fn from_json(json: &str) -> Result<Self> {
        let mut settings: Settings = serde_json::from_str(json).context("parsing settings")?;
        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::file_system(path, "read", e))?;
        tracing::debug!(path = %path.display(), "loading settings");
        Self::from_json(&json)
    }

    /// Reject settings no cluster could be built from
    pub fn validate(&self) -> Result<()> {
        if self.cluster.endpoints.is_empty() {
            return Err(Error::configuration("at least one endpoint is required"));
        }
        if let Some(blank) = self.cluster.endpoints.iter().find(|e| e.trim().is_empty()) {
            return Err(Error::configuration(format!(
                "endpoint '{blank}' is blank"
            )));
        }
        if self.cluster.virtual_nodes == 0 {
            return Err(Error::configuration("virtual_nodes must be positive"));
        }
        if self.cluster.probe_interval_secs == 0 {
            return Err(Error::configuration("probe_interval_secs must be positive"));
        }
        if self.cache.default_max_age_secs != 0
            && self.cache.default_max_age_secs < self.cache.default_cache_secs
        {
            return Err(Error::configuration(format!(
                "default_max_age_secs ({}) is below default_cache_secs ({})",
                self.cache.default_max_age_secs, self.cache.default_cache_secs
            )));
        }
        Ok(())
    }
}
