//! End-to-end packaging: normalize, sign, append trailer, encode, wrap

use log::{debug, info};

use crate::codec;
use crate::envelope::{BoardMetadata, Envelope};
use crate::error::Result;
use crate::image::{NormalizedImage, RawImage, normalize};
use crate::signing::{Signature, SigningConfig, sign};
use crate::trailer::encode_trailer;

/// Normalized image, followed by its trailer when signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload(Vec<u8>);

impl SignedPayload {
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

/// Output of a packaging run
#[derive(Debug, Clone)]
pub struct PackagedFirmware {
    pub envelope: Envelope,
    /// `None` when signing was disabled
    pub signature: Option<Signature>,
    /// Image length after alignment padding, before the trailer
    pub normalized_len: usize,
}

/// Sign `image` and append the trailer; unsigned images pass through unchanged
pub fn sign_image(
    image: NormalizedImage,
    signing: &SigningConfig,
) -> Result<(SignedPayload, Option<Signature>)> {
    let signature = sign(&image, signing)?;
    let mut bytes = image.into_bytes();

    if let Some(signature) = &signature {
        let trailer = encode_trailer(signature)?;
        bytes.extend_from_slice(trailer.as_bytes());
    }

    debug!("Signed payload: {} bytes", bytes.len());
    Ok((SignedPayload(bytes), signature))
}

/// Run the whole pipeline with an explicit build time
pub fn package_at(
    image: RawImage,
    signing: &SigningConfig,
    metadata: &BoardMetadata,
    build_time: i64,
) -> Result<PackagedFirmware> {
    let raw_len = image.len();
    let normalized = normalize(image);
    let normalized_len = normalized.len();

    let (payload, signature) = sign_image(normalized, signing)?;
    let encoded = codec::pack(payload.as_bytes())?;
    let envelope = Envelope::build_at(metadata, encoded, payload.len(), build_time)?;

    info!(
        "Packaged {} ({raw_len} byte image, {} byte payload, {})",
        metadata.summary,
        payload.len(),
        if signature.is_some() { "signed" } else { "unsigned" }
    );

    Ok(PackagedFirmware {
        envelope,
        signature,
        normalized_len,
    })
}

/// Run the whole pipeline, stamping the current build time
pub fn package(
    image: RawImage,
    signing: &SigningConfig,
    metadata: &BoardMetadata,
) -> Result<PackagedFirmware> {
    package_at(image, signing, metadata, crate::envelope::build_timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trailer::TRAILER_SIZE;

    #[test]
    fn test_unsigned_payload_equals_normalized_image() {
        let normalized = normalize(RawImage::new(vec![7; 13]));
        let (payload, signature) =
            sign_image(normalized.clone(), &SigningConfig::Disabled).unwrap();

        assert!(signature.is_none());
        assert_eq!(payload.as_bytes(), normalized.as_bytes());
    }

    #[test]
    fn test_signed_payload_appends_trailer() {
        let secret = p256::SecretKey::from_slice(&[0x11; 32]).unwrap();
        let signing = SigningConfig::Enabled {
            key: secret.into(),
        };
        let normalized = normalize(RawImage::new(vec![7; 13]));
        let (payload, signature) = sign_image(normalized, &signing).unwrap();

        assert!(signature.is_some());
        assert_eq!(payload.len(), 16 + TRAILER_SIZE);
        assert_eq!(&payload.as_bytes()[..13], &[7; 13]);
    }

    #[test]
    fn test_package_fills_envelope() {
        let packaged = package_at(
            RawImage::new(vec![0xA5; 1000]),
            &SigningConfig::Disabled,
            &BoardMetadata::cube_orange(),
            1_700_000_000,
        )
        .unwrap();

        assert_eq!(packaged.normalized_len, 1000);
        assert_eq!(packaged.envelope.image_size, 1000);
        assert_eq!(packaged.envelope.build_time, 1_700_000_000);
        assert_eq!(packaged.envelope.decode_payload().unwrap(), vec![0xA5; 1000]);
    }
}
