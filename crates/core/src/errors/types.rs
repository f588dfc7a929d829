//! Core error type definitions

use std::path::PathBuf;

/// Result type alias for hoard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for hoard operations using thiserror
///
/// Failures of the cached service itself never pass through this type; they
/// are carried as the caller's own error type. This enum only covers the
/// cache machinery: configuration, codecs and settings files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Policy or settings rejected while configuring, before any traffic
    Configuration { message: String },

    /// Envelope encoding or decoding failed
    Serialization {
        key: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Compressing or decompressing a payload failed
    Compression {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// File system operations
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// A settings document that is not valid JSON for its schema
    Json {
        #[source]
        source: serde_json::Error,
    },
}
