//! Conversions from library errors

use super::types::Error;

/// Malformed settings documents surface as [`Error::Json`]; the parser's
/// message already carries line and column.
impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Error::Json { source }
    }
}
