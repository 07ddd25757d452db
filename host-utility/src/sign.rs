//! `apjsign sign`: package a firmware image into an APJ envelope

use anyhow::{Context, Result};
use apjsign_packager::{RawImage, SigningConfig, TRAILER_SIZE, package};
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::config::{BoardOverrides, SignerConfig};
use crate::constants::APJ_EXTENSION;
use crate::utils::{self, format_with_separators, print_title_bar};

/// Inputs for a signing run
#[derive(Debug)]
pub struct SignOptions {
    pub image: PathBuf,
    /// Overrides the configured key; an empty path disables signing
    pub key: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub overrides: BoardOverrides,
}

/// `arducopter.bin` -> `arducopter.apj`, next to the image
pub fn default_output_path(image: &Path) -> PathBuf {
    image.with_extension(APJ_EXTENSION)
}

pub fn run(opts: SignOptions) -> Result<()> {
    let SignOptions {
        image: image_path,
        key,
        output,
        config: config_file,
        overrides,
    } = opts;

    let mut config = SignerConfig::load(config_file.as_deref())?;
    config.apply_overrides(overrides);
    config.validate().context("Invalid board configuration")?;
    config.board.git_identity =
        utils::resolve_git_identity(&config.board.git_identity, Path::new("."));

    let key_path = key.or_else(|| config.key_path.clone());
    let output = output.unwrap_or_else(|| default_output_path(&image_path));

    println!();
    print_title_bar("APJ Firmware Signer");
    utils::info(&format!("Image:  {}", image_path.display()));
    match &key_path {
        Some(path) if !path.as_os_str().is_empty() => {
            utils::info(&format!("Key:    {}", path.display()));
        }
        _ => utils::info(&format!("Key:    {}", "(none)".dimmed())),
    }
    utils::info(&format!("Output: {}", output.display()));
    println!();

    let image = RawImage::read(&image_path).context("Failed to load firmware image")?;
    let signing = SigningConfig::from_optional_key_file(key_path.as_deref())
        .context("Failed to load signing key")?;
    if !signing.is_enabled() {
        utils::warning("No signing key configured, the image will not be signed");
    }

    let packaged =
        package(image, &signing, &config.board).context("Failed to package firmware")?;
    packaged
        .envelope
        .write_to(&output)
        .context("Failed to write APJ envelope")?;

    let envelope = &packaged.envelope;
    if let Some(signature) = &packaged.signature {
        utils::success(&format!(
            "Signed with {}-byte ECDSA P-256 signature ({TRAILER_SIZE}-byte trailer)",
            signature.len()
        ));
        log::debug!("Signature: {}", signature.to_hex());
    }
    utils::success(&format!(
        "{} v{} (board {}, git {})",
        envelope.summary, envelope.version, envelope.board_id, envelope.git_identity
    ));
    utils::info(&format!(
        "Image size: {} bytes",
        format_with_separators(i64::try_from(envelope.image_size).unwrap_or(i64::MAX))
    ));
    utils::info(&format!(
        "Flash free: {} of {} bytes",
        format_with_separators(envelope.flash_free),
        format_with_separators(i64::try_from(envelope.flash_total).unwrap_or(i64::MAX))
    ));
    if envelope.flash_free < 0 {
        utils::warning("Image is larger than the board flash");
    }
    utils::success(&format!("Wrote {}", output.display()));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("build/CubeOrange/bin/arducopter.bin")),
            PathBuf::from("build/CubeOrange/bin/arducopter.apj")
        );
        assert_eq!(
            default_output_path(Path::new("firmware")),
            PathBuf::from("firmware.apj")
        );
    }

    #[test]
    fn test_run_writes_unsigned_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("arducopter.bin");
        std::fs::write(&image, vec![0x42u8; 1000]).unwrap();
        let config = dir.path().join("config.json");
        SignerConfig::default().save_to(&config).unwrap();

        run(SignOptions {
            image,
            key: Some(PathBuf::new()),
            output: None,
            config: Some(config),
            overrides: BoardOverrides {
                git_identity: Some("648dee21".to_string()),
                ..Default::default()
            },
        })
        .unwrap();

        let envelope =
            apjsign_packager::Envelope::read(&dir.path().join("arducopter.apj")).unwrap();
        assert_eq!(envelope.image_size, 1000);
        assert_eq!(envelope.git_identity, "648dee21");
        assert_eq!(envelope.decode_payload().unwrap(), vec![0x42u8; 1000]);
    }

    #[test]
    fn test_run_with_bad_key_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("arducopter.bin");
        let key = dir.path().join("privatekey.pem");
        std::fs::write(&image, b"firmware").unwrap();
        std::fs::write(&key, "garbage").unwrap();
        let config = dir.path().join("config.json");
        SignerConfig::default().save_to(&config).unwrap();

        let result = run(SignOptions {
            image,
            key: Some(key),
            output: None,
            config: Some(config),
            overrides: BoardOverrides {
                git_identity: Some("648dee21".to_string()),
                ..Default::default()
            },
        });

        assert!(result.is_err());
        assert!(!dir.path().join("arducopter.apj").exists());
    }
}
