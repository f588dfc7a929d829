//! Builder methods for creating errors with context

use super::types::Error;
use std::path::PathBuf;

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a serialization error for a cache key
    #[must_use]
    pub fn serialization(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Serialization {
            key: key.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a serialization error with a source error
    #[must_use]
    pub fn serialization_with_source(
        key: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            key: key.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a compression error
    #[must_use]
    pub fn compression(operation: &'static str, source: std::io::Error) -> Self {
        Error::Compression { operation, source }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Whether this error was raised while validating configuration
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }
}
