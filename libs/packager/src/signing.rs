//! Firmware signing
//!
//! Signatures are ECDSA over NIST P-256 with a SHA-256 digest of the
//! normalized image, deterministic RFC 6979 nonces and DER output. A DER
//! P-256 signature is at most 72 bytes, so it always fits the trailer.

use log::debug;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use zeroize::Zeroizing;

use crate::error::{PackageError, Result};
use crate::image::NormalizedImage;

const SEC1_PEM_LABEL: &str = "EC PRIVATE KEY";
const PKCS8_PEM_LABEL: &str = "PRIVATE KEY";

/// Locate the `label` block in `pem`, ignoring anything around it.
///
/// `openssl ecparam -genkey` writes an `EC PARAMETERS` block ahead of the key.
fn pem_block<'a>(pem: &'a str, label: &str) -> Option<&'a str> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");
    let start = pem.find(&begin)?;
    let stop = start + pem[start..].find(&end)? + end.len();
    Some(&pem[start..stop])
}

/// Whether, and with which key, the image is signed
pub enum SigningConfig {
    Disabled,
    Enabled { key: SigningKey },
}

impl SigningConfig {
    /// Parse a PEM private key (SEC1 or PKCS#8)
    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = if let Some(block) = pem_block(pem, SEC1_PEM_LABEL) {
            p256::SecretKey::from_sec1_pem(block)
                .map(SigningKey::from)
                .map_err(|e| PackageError::KeyFormat(format!("SEC1 P-256 key: {e}")))?
        } else {
            let block = pem_block(pem, PKCS8_PEM_LABEL).unwrap_or(pem);
            SigningKey::from_pkcs8_pem(block)
                .map_err(|e| PackageError::KeyFormat(format!("PKCS#8 P-256 key: {e}")))?
        };
        Ok(Self::Enabled { key })
    }

    /// Load a PEM key file; the key text is wiped after parsing
    pub fn from_key_file(path: &Path) -> Result<Self> {
        let pem = Zeroizing::new(std::fs::read_to_string(path).map_err(|source| {
            PackageError::InputIo {
                path: path.to_path_buf(),
                source,
            }
        })?);
        debug!("Loaded signing key from {}", path.display());
        Self::from_pem(&pem).map_err(|e| match e {
            PackageError::KeyFormat(msg) => {
                PackageError::KeyFormat(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Key path from configuration; `None` or an empty path disables signing
    pub fn from_optional_key_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if !p.as_os_str().is_empty() => Self::from_key_file(p),
            _ => Ok(Self::Disabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Enabled { .. } => f.write_str("Enabled { key: <redacted> }"),
        }
    }
}

/// DER-encoded ECDSA signature bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
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

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// SHA-256 over the full normalized image
pub fn image_digest(image: &NormalizedImage) -> [u8; 32] {
    Sha256::digest(image.as_bytes()).into()
}

/// Sign the normalized image, or return `None` when signing is disabled
pub fn sign(image: &NormalizedImage, config: &SigningConfig) -> Result<Option<Signature>> {
    let SigningConfig::Enabled { key } = config else {
        debug!("Signing disabled, payload is the normalized image");
        return Ok(None);
    };

    let digest = image_digest(image);
    debug!("Image digest: {}", hex::encode(digest));

    let signature: EcdsaSignature = key
        .sign_prehash(&digest)
        .map_err(|e| PackageError::Signing(e.to_string()))?;
    let der = signature.to_der();
    let signature = Signature(der.as_bytes().to_vec());

    debug!(
        "Signature ({} bytes): {}",
        signature.len(),
        signature.to_hex()
    );
    Ok(Some(signature))
}
