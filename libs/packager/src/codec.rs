//! Payload compression and text encoding
//!
//! Envelope images are zlib streams at maximum compression, base64 encoded
//! with the standard alphabet so they embed directly in JSON.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use log::debug;
use std::io::{Read, Write};

use crate::error::{PackageError, Result};

/// Compress and text-encode a signed payload
pub fn pack(payload: &[u8]) -> Result<String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(payload)
        .map_err(|e| PackageError::Encoding(format!("zlib compression failed: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| PackageError::Encoding(format!("zlib compression failed: {e}")))?;

    debug!(
        "Compressed payload {} -> {} bytes",
        payload.len(),
        compressed.len()
    );
    Ok(BASE64.encode(compressed))
}

/// Inverse of [`pack`]
pub fn unpack(encoded: &str) -> Result<Vec<u8>> {
    let compressed = BASE64
        .decode(encoded.trim())
        .map_err(|e| PackageError::Encoding(format!("invalid base64 image: {e}")))?;

    let mut payload = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut payload)
        .map_err(|e| PackageError::Encoding(format!("zlib decompression failed: {e}")))?;
    Ok(payload)
}
