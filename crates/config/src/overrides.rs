//! Environment variable overrides

use crate::settings::Settings;
use hoard_core::{Error, Result};

/// Comma-separated endpoint list replacing `cluster.endpoints`
pub const ENV_ENDPOINTS: &str = "HOARD_ENDPOINTS";
/// Replaces `cluster.probe_interval_secs`
pub const ENV_PROBE_INTERVAL_SECS: &str = "HOARD_PROBE_INTERVAL_SECS";
/// Replaces `cache.key_salt`; an empty value clears it
pub const ENV_KEY_SALT: &str = "HOARD_KEY_SALT";

impl Settings {
    /// Overlay values from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Overlay values from an arbitrary variable source
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_ENDPOINTS) {
            self.cluster.endpoints = raw
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(String::from)
                .collect();
            tracing::debug!(count = self.cluster.endpoints.len(), "endpoints overridden from environment");
        }

        if let Some(raw) = lookup(ENV_PROBE_INTERVAL_SECS) {
            self.cluster.probe_interval_secs = raw.trim().parse().map_err(|_| {
                Error::configuration(format!(
                    "{ENV_PROBE_INTERVAL_SECS} must be a whole number of seconds, got '{raw}'"
                ))
            })?;
        }

        if let Some(raw) = lookup(ENV_KEY_SALT) {
            self.cache.key_salt = if raw.is_empty() { None } else { Some(raw) };
        }

        Ok(())
    }
}
