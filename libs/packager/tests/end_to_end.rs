//! End-to-end packaging scenarios with on-disk images and keys

use apjsign_packager::signing::image_digest;
use apjsign_packager::{
    BoardMetadata, Envelope, PackageError, RawImage, SigningConfig, TRAILER_SIZE, decode_trailer,
    normalize, package_at,
};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use p256::pkcs8::{EncodePrivateKey, LineEnding};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BUILD_TIME: i64 = 1_700_000_000;

fn secret() -> p256::SecretKey {
    p256::SecretKey::from_slice(&[
        0xc9, 0xaf, 0xa9, 0xd8, 0x45, 0xba, 0x75, 0x16, 0x6b, 0x5c, 0x21, 0x57, 0x67, 0xb1, 0xd6,
        0x93, 0x4e, 0x50, 0xc3, 0xdb, 0x36, 0xe8, 0x9b, 0x12, 0x7b, 0x8a, 0x62, 0x2b, 0x12, 0x0f,
        0x67, 0x21,
    ])
    .unwrap()
}

fn write_key(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("privatekey.pem");
    let pem = secret().to_pkcs8_pem(LineEnding::LF).unwrap();
    std::fs::write(&path, pem.as_bytes()).unwrap();
    path
}

fn write_image(dir: &TempDir, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join("arducopter.bin");
    std::fs::write(&path, bytes).unwrap();
    path
}

fn metadata() -> BoardMetadata {
    let mut metadata = BoardMetadata::cube_orange();
    metadata.git_identity = "648dee21".to_string();
    metadata
}

#[test]
fn unsigned_1000_byte_image() {
    let dir = TempDir::new().unwrap();
    let bytes: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 256) as u8).collect();
    let image_path = write_image(&dir, &bytes);

    let signing = SigningConfig::from_optional_key_file(None).unwrap();
    let packaged = package_at(
        RawImage::read(&image_path).unwrap(),
        &signing,
        &metadata(),
        BUILD_TIME,
    )
    .unwrap();
    let envelope = packaged.envelope;

    assert!(packaged.signature.is_none());
    assert_eq!(packaged.normalized_len, 1000);
    assert_eq!(envelope.image_size, 1000);
    assert_eq!(envelope.flash_free, 1_835_008 - 1000);
    assert_eq!(envelope.decode_payload().unwrap(), bytes);
}

#[test]
fn signed_10_byte_image() {
    let dir = TempDir::new().unwrap();
    let bytes = b"0123456789".to_vec();
    let image_path = write_image(&dir, &bytes);
    let key_path = write_key(&dir);

    let signing = SigningConfig::from_optional_key_file(Some(&key_path)).unwrap();
    let packaged = package_at(
        RawImage::read(&image_path).unwrap(),
        &signing,
        &metadata(),
        BUILD_TIME,
    )
    .unwrap();
    let signature = packaged.signature.clone().unwrap();

    assert_eq!(packaged.normalized_len, 12);
    assert_eq!(packaged.envelope.image_size, (12 + TRAILER_SIZE) as u64);

    let payload = packaged.envelope.decode_payload().unwrap();
    assert_eq!(payload.len(), 88);
    assert_eq!(&payload[..10], bytes.as_slice());
    assert_eq!(&payload[10..12], &[0, 0]);

    let recovered = decode_trailer(&payload).unwrap();
    assert_eq!(recovered, signature);

    // The recovered signature verifies over the normalized image
    let normalized = normalize(RawImage::new(payload[..12].to_vec()));
    let verifying_key = VerifyingKey::from(&SigningKey::from(secret()));
    let parsed = EcdsaSignature::from_der(recovered.as_bytes()).unwrap();
    verifying_key
        .verify_prehash(&image_digest(&normalized), &parsed)
        .unwrap();
}

#[test]
fn signing_twice_gives_identical_trailers() {
    let dir = TempDir::new().unwrap();
    let key_path = write_key(&dir);
    let signing = SigningConfig::from_key_file(&key_path).unwrap();
    let image = RawImage::new(vec![0xC3; 4096]);

    let first = package_at(image.clone(), &signing, &metadata(), BUILD_TIME).unwrap();
    let second = package_at(image, &signing, &metadata(), BUILD_TIME).unwrap();

    assert_eq!(first.signature, second.signature);
    assert_eq!(first.envelope, second.envelope);
}

#[test]
fn oversized_image_reports_negative_free_flash() {
    let mut metadata = metadata();
    metadata.flash_total = 1024;

    let packaged = package_at(
        RawImage::new(vec![1; 2048]),
        &SigningConfig::Disabled,
        &metadata,
        BUILD_TIME,
    )
    .unwrap();

    assert_eq!(packaged.envelope.flash_free, -1024);
}

#[test]
fn written_envelope_parses_back() {
    let dir = TempDir::new().unwrap();
    let key_path = write_key(&dir);
    let output = dir.path().join("arducopter.apj");

    let signing = SigningConfig::from_key_file(&key_path).unwrap();
    let packaged = package_at(
        RawImage::new(b"firmware".to_vec()),
        &signing,
        &metadata(),
        BUILD_TIME,
    )
    .unwrap();
    packaged.envelope.write_to(&output).unwrap();

    let parsed = Envelope::read(&output).unwrap();
    assert_eq!(parsed, packaged.envelope);
    assert_eq!(parsed.git_identity, "648dee21");
    assert_eq!(parsed.usb_id, "0x2dae/0x1016");
    assert_eq!(parsed.build_time, BUILD_TIME);

    let json = std::fs::read_to_string(&output).unwrap();
    assert!(json.contains("\"USBID\": \"0x2dae/0x1016\""));
    assert!(json.contains("\"magic\": \"APJFWv1\""));
}

#[test]
fn missing_image_is_input_error() {
    let err = RawImage::read(Path::new("/nonexistent/arducopter.bin")).unwrap_err();
    assert!(matches!(err, PackageError::InputIo { .. }));
}

#[test]
fn malformed_key_aborts_before_output() {
    let dir = TempDir::new().unwrap();
    let key_path = dir.path().join("privatekey.pem");
    std::fs::write(&key_path, "not a key").unwrap();

    let err = SigningConfig::from_key_file(&key_path).unwrap_err();
    assert!(matches!(err, PackageError::KeyFormat(_)));
    assert!(err.to_string().contains("privatekey.pem"));
}
