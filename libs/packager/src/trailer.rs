//! Fixed-width signature trailer
//!
//! The signature is right-aligned in a [`TRAILER_SIZE`] byte block. The
//! bytes in front of it hold the signature length as a big-endian integer
//! spanning exactly `TRAILER_SIZE - L` bytes, so the block width never
//! depends on the signature length.
//!
//! ```text
//! [0x00 .. 0x00][L][signature: L bytes]
//! |<-- TRAILER_SIZE - L -->|
//! ```

use log::debug;

use crate::error::{PackageError, Result};
use crate::signing::Signature;

/// Total length of every trailer in bytes
pub const TRAILER_SIZE: usize = 76;

/// Encoded trailer, always exactly [`TRAILER_SIZE`] bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer([u8; TRAILER_SIZE]);

impl Trailer {
    pub fn as_bytes(&self) -> &[u8; TRAILER_SIZE] {
        &self.0
    }
}

/// Write `value` big-endian into exactly `width` bytes, zero-filled on the left.
///
/// Returns `None` when `value` needs more than `width` bytes.
fn big_endian_fixed(value: usize, width: usize) -> Option<Vec<u8>> {
    let be = u64::try_from(value).ok()?.to_be_bytes();
    let significant = be.iter().position(|&b| b != 0).unwrap_or(be.len());
    let needed = be.len() - significant;
    if needed > width {
        return None;
    }
    let mut out = vec![0u8; width - needed];
    out.extend_from_slice(&be[significant..]);
    Some(out)
}

/// Build the trailer for `signature`.
///
/// Fails with [`PackageError::TrailerOverflow`] unless
/// `0 < len < TRAILER_SIZE`; the signature is never truncated.
pub fn encode_trailer(signature: &Signature) -> Result<Trailer> {
    let len = signature.len();
    if len == 0 || len >= TRAILER_SIZE {
        return Err(PackageError::TrailerOverflow { len });
    }

    let prefix =
        big_endian_fixed(len, TRAILER_SIZE - len).ok_or(PackageError::TrailerOverflow { len })?;

    let mut block = [0u8; TRAILER_SIZE];
    block[..prefix.len()].copy_from_slice(&prefix);
    block[prefix.len()..].copy_from_slice(signature.as_bytes());

    debug!(
        "Encoded trailer: {} prefix bytes + {len} signature bytes",
        prefix.len()
    );
    Ok(Trailer(block))
}

/// Recover the signature from the last [`TRAILER_SIZE`] bytes of a signed payload.
pub fn decode_trailer(signed_payload: &[u8]) -> Result<Signature> {
    let Some(start) = signed_payload.len().checked_sub(TRAILER_SIZE) else {
        return Err(PackageError::MalformedTrailer(format!(
            "payload of {} bytes is shorter than the trailer",
            signed_payload.len()
        )));
    };
    let block = &signed_payload[start..];

    let Some(len_index) = block.iter().position(|&b| b != 0) else {
        return Err(PackageError::MalformedTrailer(
            "trailer is all zero".to_string(),
        ));
    };

    // Signature lengths are below TRAILER_SIZE, so the length is a single byte.
    let len = usize::from(block[len_index]);
    if len_index + 1 + len != TRAILER_SIZE {
        return Err(PackageError::MalformedTrailer(format!(
            "length byte {len} at offset {len_index} does not match the trailer width"
        )));
    }

    Ok(Signature::from_bytes(block[len_index + 1..].to_vec()))
}
