//! `apjsign inspect`: decode an existing APJ envelope
//!
//! This is a structural check. It decodes the payload and the trailer
//! layout but does not verify the signature against any public key.

use anyhow::{Context, Result};
use apjsign_packager::{Envelope, Signature, TRAILER_SIZE, decode_trailer};
use chrono::DateTime;
use colored::Colorize;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::utils::{self, format_with_separators, print_title_bar};

/// DER SEQUENCE tag that starts every ECDSA signature
const DER_SEQUENCE_TAG: u8 = 0x30;

/// Signature found in the payload trailer, if the trailer layout decodes
fn embedded_signature(payload: &[u8]) -> Option<Signature> {
    decode_trailer(payload)
        .ok()
        .filter(|sig| sig.as_bytes().first() == Some(&DER_SEQUENCE_TAG))
}

fn format_build_time(build_time: i64) -> String {
    DateTime::from_timestamp(build_time, 0).map_or_else(
        || build_time.to_string(),
        |dt| format!("{} ({build_time})", dt.format("%Y-%m-%d %H:%M:%S UTC")),
    )
}

pub fn run(apj: &Path, extract: Option<&Path>) -> Result<()> {
    let envelope = Envelope::read(apj).context("Failed to read APJ envelope")?;
    let payload = envelope
        .decode_payload()
        .context("Failed to decode APJ image")?;

    println!();
    print_title_bar(&format!("{} v{}", envelope.summary, envelope.version));
    utils::info(&format!("Description:    {}", envelope.description));
    utils::info(&format!(
        "Board:          {} (revision {})",
        envelope.board_id, envelope.board_revision
    ));
    utils::info(&format!("USB ID:         {}", envelope.usb_id));
    utils::info(&format!("Git identity:   {}", envelope.git_identity));
    utils::info(&format!(
        "Built:          {}",
        format_build_time(envelope.build_time)
    ));
    utils::info(&format!(
        "Image size:     {} bytes",
        format_with_separators(i64::try_from(payload.len()).unwrap_or(i64::MAX))
    ));
    utils::info(&format!(
        "Flash free:     {} bytes",
        format_with_separators(envelope.flash_free)
    ));
    utils::info(&format!(
        "Payload SHA-256: {}",
        hex::encode(Sha256::digest(&payload))
    ));

    if !envelope.flash_accounting_consistent() {
        utils::warning("flash_free does not equal flash_total - image_size");
    }
    if envelope.flash_free < 0 {
        utils::warning("Image is larger than the board flash");
    }

    match embedded_signature(&payload) {
        Some(signature) => {
            utils::success(&format!(
                "Trailer holds a {}-byte signature over the first {} bytes",
                signature.len(),
                payload.len() - TRAILER_SIZE
            ));
            log::debug!("Signature: {}", signature.to_hex());
        }
        None => utils::info(&"No signature trailer".dimmed().to_string()),
    }

    if let Some(path) = extract {
        std::fs::write(path, &payload)
            .with_context(|| format!("Failed to write payload: {}", path.display()))?;
        utils::success(&format!("Extracted payload to {}", path.display()));
    }

    Ok(())
}
