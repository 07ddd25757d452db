//! Signing and packaging pipeline for APJ firmware containers
//!
//! A compiled firmware image is padded to word alignment, optionally signed
//! with ECDSA P-256, given a fixed-width signature trailer, compressed, and
//! wrapped in a JSON envelope together with board metadata.
//!
//! ```text
//! RawImage -> normalize -> sign -> encode_trailer -> pack -> Envelope
//! ```
//!
//! # Example
//!
//! ```rust
//! use apjsign_packager::{BoardMetadata, RawImage, SigningConfig, package_at};
//!
//! let image = RawImage::new(vec![0u8; 1000]);
//! let packaged = package_at(
//!     image,
//!     &SigningConfig::Disabled,
//!     &BoardMetadata::cube_orange(),
//!     1_700_000_000,
//! )
//! .unwrap();
//!
//! assert_eq!(packaged.envelope.image_size, 1000);
//! println!("{}", packaged.envelope.to_json().unwrap());
//! ```

pub mod codec;
pub mod envelope;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod signing;
pub mod trailer;

pub use envelope::{BoardMetadata, Envelope, MAGIC};
pub use error::{PackageError, Result};
pub use image::{IMAGE_ALIGNMENT, NormalizedImage, RawImage, normalize};
pub use pipeline::{PackagedFirmware, SignedPayload, package, package_at, sign_image};
pub use signing::{Signature, SigningConfig, sign};
pub use trailer::{TRAILER_SIZE, Trailer, decode_trailer, encode_trailer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
