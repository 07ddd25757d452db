//! Error taxonomy for the packaging pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Packaging errors
///
/// Every variant is fatal: the pipeline aborts and no envelope is written.
#[derive(Error, Debug)]
pub enum PackageError {
    /// Image or key file missing or unreadable
    #[error("Failed to read {}: {source}", .path.display())]
    InputIo {
        /// File that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Key material present but not a usable P-256 private key
    #[error("Invalid signing key: {0}")]
    KeyFormat(String),

    /// The ECDSA operation itself failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Signature does not fit the fixed trailer budget
    #[error(
        "Signature of {len} bytes does not fit the {limit}-byte trailer",
        limit = crate::trailer::TRAILER_SIZE
    )]
    TrailerOverflow {
        /// Length of the offending signature
        len: usize,
    },

    /// Trailer bytes do not follow the length-prefix layout
    #[error("Malformed trailer: {0}")]
    MalformedTrailer(String),

    /// Compression or text encoding failure
    #[error("Payload encoding failed: {0}")]
    Encoding(String),

    /// Envelope could not be written
    #[error("Failed to write {}: {source}", .path.display())]
    OutputIo {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An existing envelope failed to parse or is internally inconsistent
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),
}

/// Result type for packaging operations
pub type Result<T> = std::result::Result<T, PackageError>;
