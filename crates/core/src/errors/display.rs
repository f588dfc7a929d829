//! Display implementations for error types

use super::types::Error;
use std::fmt;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration { message } => {
                write!(f, "configuration error: {message}")
            }
            Error::Serialization { key, message, .. } => {
                if key.is_empty() {
                    write!(f, "serialization error: {message}")
                } else {
                    write!(f, "serialization error for key '{key}': {message}")
                }
            }
            Error::Compression { operation, source } => {
                write!(f, "compression {operation} failed: {source}")
            }
            Error::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "file system {} operation failed for '{}': {}",
                    operation,
                    path.display(),
                    source
                )
            }
            Error::Json { source } => write!(f, "invalid JSON: {source}"),
        }
    }
}
