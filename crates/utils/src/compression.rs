//! Gzip framing for cache payloads.
//!
//! Cached envelopes are JSON, which compresses well; every payload written
//! to a backend store passes through here.

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use hoard_core::{Error, Result};
use std::io::{Read, Write};

/// Gzip `data` at the default compression level
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::compression("compress", e))?;
    encoder
        .finish()
        .map_err(|e| Error::compression("compress", e))
}

/// Inflate a gzip payload produced by [`compress`]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::compression("decompress", e))?;
    Ok(out)
}
