//! Extension traits for error handling

use super::types::{Error, Result};

/// Attach a human-readable stage to a failure, turning it into a
/// configuration error. Used while loading settings, where every failure is
/// fatal and the stage is the useful part of the message.
pub trait ResultExt<T> {
    /// Prefix the error with `stage`
    fn context(self, stage: impl Into<String>) -> Result<T>;

    /// Prefix the error with a lazily built stage
    fn with_context<F>(self, stage: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, stage: impl Into<String>) -> Result<T> {
        self.with_context(|| stage.into())
    }

    fn with_context<F>(self, stage: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Error::configuration(format!("{}: {}", stage(), e.into())))
    }
}
