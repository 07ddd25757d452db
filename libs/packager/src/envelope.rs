//! APJ envelope: board metadata plus the encoded signed payload
//!
//! The envelope is a flat JSON object. Field order is part of the format
//! and follows the struct declaration order below.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::ser::{Formatter, PrettyFormatter};
use std::io::{self, Write};
use std::path::Path;

use crate::codec;
use crate::error::{PackageError, Result};

/// Format identifier stored in every envelope
pub const MAGIC: &str = "APJFWv1";

/// Environment variable that pins the build timestamp
pub const SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";

/// Static description of the target board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardMetadata {
    pub board_id: u32,
    pub description: String,
    pub summary: String,
    /// Firmware version string
    pub version: String,
    /// Total flash size in bytes
    pub flash_total: u64,
    /// Source revision the image was built from
    #[serde(default)]
    pub git_identity: String,
    #[serde(default)]
    pub board_revision: u32,
    /// USB vendor/product pair, e.g. `0x2dae/0x1016`
    pub usb_id: String,
}

impl BoardMetadata {
    /// CubeOrange (STM32H753) board profile
    pub fn cube_orange() -> Self {
        Self {
            board_id: 140,
            description: "Firmware for a STM32H753xx board".to_string(),
            summary: "CubeOrange".to_string(),
            version: "0.1".to_string(),
            flash_total: 1_835_008,
            git_identity: String::new(),
            board_revision: 0,
            usb_id: "0x2dae/0x1016".to_string(),
        }
    }
}

/// Serialized firmware container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub board_id: u32,
    pub magic: String,
    pub description: String,
    /// Base64 of the zlib-compressed signed payload
    pub image: String,
    pub summary: String,
    pub version: String,
    /// Length of the uncompressed signed payload
    pub image_size: u64,
    pub flash_total: u64,
    /// `flash_total - image_size`; negative when the image does not fit
    pub flash_free: i64,
    pub git_identity: String,
    pub board_revision: u32,
    #[serde(rename = "USBID")]
    pub usb_id: String,
    /// Unix seconds
    pub build_time: i64,
}

/// Free flash after writing `image_size` bytes, saturating at the `i64` range
pub fn flash_free(flash_total: u64, image_size: u64) -> i64 {
    let free = i128::from(flash_total) - i128::from(image_size);
    i64::try_from(free).unwrap_or(if free < 0 { i64::MIN } else { i64::MAX })
}

/// Parse a `SOURCE_DATE_EPOCH` value
pub fn parse_source_date_epoch(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

/// Build timestamp: `SOURCE_DATE_EPOCH` when set and valid, otherwise now
pub fn build_timestamp() -> i64 {
    if let Ok(value) = std::env::var(SOURCE_DATE_EPOCH) {
        if let Some(epoch) = parse_source_date_epoch(&value) {
            debug!("Using {SOURCE_DATE_EPOCH}={epoch} as build time");
            return epoch;
        }
        warn!("Ignoring invalid {SOURCE_DATE_EPOCH} value: {value}");
    }
    chrono::Utc::now().timestamp()
}

impl Envelope {
    /// Assemble an envelope stamped with the current build time
    pub fn build(metadata: &BoardMetadata, image: String, image_size: usize) -> Result<Self> {
        Self::build_at(metadata, image, image_size, build_timestamp())
    }

    /// Assemble an envelope with an explicit build time
    pub fn build_at(
        metadata: &BoardMetadata,
        image: String,
        image_size: usize,
        build_time: i64,
    ) -> Result<Self> {
        let image_size = u64::try_from(image_size)
            .map_err(|_| PackageError::Encoding(format!("image size {image_size} overflows")))?;

        Ok(Self {
            board_id: metadata.board_id,
            magic: MAGIC.to_string(),
            description: metadata.description.clone(),
            image,
            summary: metadata.summary.clone(),
            version: metadata.version.clone(),
            image_size,
            flash_total: metadata.flash_total,
            flash_free: flash_free(metadata.flash_total, image_size),
            git_identity: metadata.git_identity.clone(),
            board_revision: metadata.board_revision,
            usb_id: metadata.usb_id.clone(),
            build_time,
        })
    }

    /// Serialize as JSON with four-space indentation and ASCII-only output
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, AsciiPrettyFormatter::new());
        self.serialize(&mut serializer)
            .map_err(|e| PackageError::Encoding(format!("envelope serialization failed: {e}")))?;
        String::from_utf8(buf)
            .map_err(|e| PackageError::Encoding(format!("envelope is not UTF-8: {e}")))
    }

    /// Parse an existing envelope
    pub fn from_json(text: &str) -> Result<Self> {
        let envelope: Self = serde_json::from_str(text)
            .map_err(|e| PackageError::InvalidEnvelope(e.to_string()))?;
        if envelope.magic != MAGIC {
            return Err(PackageError::InvalidEnvelope(format!(
                "unsupported magic '{}', expected '{MAGIC}'",
                envelope.magic
            )));
        }
        Ok(envelope)
    }

    /// Read and parse an envelope file
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PackageError::InputIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Decode the embedded payload and check it against `image_size`
    pub fn decode_payload(&self) -> Result<Vec<u8>> {
        let payload = codec::unpack(&self.image)?;
        if payload.len() as u64 != self.image_size {
            return Err(PackageError::InvalidEnvelope(format!(
                "image decodes to {} bytes but image_size is {}",
                payload.len(),
                self.image_size
            )));
        }
        Ok(payload)
    }

    /// Whether `flash_free` matches `flash_total - image_size`
    pub fn flash_accounting_consistent(&self) -> bool {
        self.flash_free == flash_free(self.flash_total, self.image_size)
    }

    /// Write the envelope so that `path` only ever holds a complete file.
    ///
    /// The JSON goes to a temporary file in the destination directory,
    /// which is then renamed over `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        let output_err = |source| PackageError::OutputIo {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(output_err)?;
        tmp.write_all(json.as_bytes()).map_err(output_err)?;
        tmp.as_file().sync_all().map_err(output_err)?;
        tmp.persist(path).map_err(|e| output_err(e.error))?;

        debug!("Wrote {} byte envelope to {}", json.len(), path.display());
        Ok(())
    }
}

/// Four-space pretty printer that escapes every non-ASCII character.
///
/// Matches the bytes of `json.dumps(envelope, indent=4)`: code points
/// above U+007F become lowercase `\uXXXX`, astral ones as surrogate pairs.
struct AsciiPrettyFormatter(PrettyFormatter<'static>);

impl AsciiPrettyFormatter {
    fn new() -> Self {
        Self(PrettyFormatter::with_indent(b"    "))
    }
}

impl Formatter for AsciiPrettyFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut rest = fragment;
        while let Some(idx) = rest.find(|c: char| !c.is_ascii()) {
            writer.write_all(&rest.as_bytes()[..idx])?;
            let mut chars = rest[idx..].chars();
            if let Some(c) = chars.next() {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
            rest = chars.as_str();
        }
        writer.write_all(rest.as_bytes())
    }

    fn begin_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_array(writer)
    }

    fn end_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_array(writer)
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_array_value(writer)
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object(writer)
    }

    fn end_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_object(writer)
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object_key(writer, first)
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_object_value(writer)
    }
}
