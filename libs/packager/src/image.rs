//! Raw firmware images and word alignment

use log::debug;
use std::path::Path;

use crate::error::{PackageError, Result};

/// Alignment boundary, in bytes, for every normalized image
pub const IMAGE_ALIGNMENT: usize = 4;

/// Compiled firmware exactly as read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage(Vec<u8>);

impl RawImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Read an image file in one pass
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| PackageError::InputIo {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Read {} image bytes from {}", bytes.len(), path.display());
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for RawImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Image padded with zero bytes to a multiple of [`IMAGE_ALIGNMENT`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage(Vec<u8>);

impl NormalizedImage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Pad `image` with zero bytes until its length is word aligned.
///
/// Never truncates; an already aligned image is returned unchanged.
pub fn normalize(image: RawImage) -> NormalizedImage {
    let mut bytes = image.0;
    let aligned_len = bytes.len().next_multiple_of(IMAGE_ALIGNMENT);
    let padding = aligned_len - bytes.len();
    bytes.resize(aligned_len, 0);
    debug!("Normalized image: {aligned_len} bytes ({padding} bytes padding)");
    NormalizedImage(bytes)
}
