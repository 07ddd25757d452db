// Configuration management for the apjsign host utility
//
// Board metadata and the default signing key live in a JSON file under the
// XDG config directory. Command-line flags override individual fields.

use anyhow::{Context, Result};
use apjsign_packager::BoardMetadata;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ConfigCommands;

const CONFIG_VERSION: u32 = 1;

/// apjsign configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Configuration schema version for future migrations
    pub version: u32,

    /// Board metadata written into every envelope
    pub board: BoardMetadata,

    /// PEM private key; absent or empty means images are not signed
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            board: BoardMetadata::cube_orange(),
            key_path: None,
        }
    }
}

/// Per-invocation overrides from the command line
#[derive(Debug, Default, Clone)]
pub struct BoardOverrides {
    pub board_id: Option<u32>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub fw_version: Option<String>,
    pub flash_total: Option<u64>,
    pub git_identity: Option<String>,
    pub board_revision: Option<u32>,
    pub usb_id: Option<String>,
}

impl SignerConfig {
    /// Load from `path`, or from the default location.
    ///
    /// An explicit path must exist. A missing default file falls back to
    /// the built-in CubeOrange profile.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            log::debug!(
                "No config at {}, using built-in board profile",
                config_path.display()
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get the XDG-compliant configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory (XDG_CONFIG_HOME or ~/.config)")?;

        Ok(config_dir.join("apjsign").join("config.json"))
    }

    /// Validate board metadata
    pub fn validate(&self) -> Result<()> {
        let board = &self.board;

        if board.summary.trim().is_empty() {
            anyhow::bail!("Board summary must not be empty");
        }
        if board.version.trim().is_empty() {
            anyhow::bail!("Firmware version must not be empty");
        }
        if board.flash_total == 0 {
            anyhow::bail!("Flash size must be greater than zero");
        }
        validate_usb_id(&board.usb_id)?;

        Ok(())
    }

    /// Apply command-line overrides on top of the loaded board metadata
    pub fn apply_overrides(&mut self, overrides: BoardOverrides) {
        let board = &mut self.board;
        let BoardOverrides {
            board_id,
            description,
            summary,
            fw_version,
            flash_total,
            git_identity,
            board_revision,
            usb_id,
        } = overrides;

        if let Some(v) = board_id {
            board.board_id = v;
        }
        if let Some(v) = description {
            board.description = v;
        }
        if let Some(v) = summary {
            board.summary = v;
        }
        if let Some(v) = fw_version {
            board.version = v;
        }
        if let Some(v) = flash_total {
            board.flash_total = v;
        }
        if let Some(v) = git_identity {
            board.git_identity = v;
        }
        if let Some(v) = board_revision {
            board.board_revision = v;
        }
        if let Some(v) = usb_id {
            board.usb_id = v;
        }
    }
}

/// Check a USB identifier of the form `0xVVVV/0xPPPP`
pub fn validate_usb_id(usb_id: &str) -> Result<()> {
    let valid_half = |half: &str| {
        half.strip_prefix("0x")
            .is_some_and(|hex| hex.len() == 4 && hex.chars().all(|c| c.is_ascii_hexdigit()))
    };

    match usb_id.split_once('/') {
        Some((vid, pid)) if valid_half(vid) && valid_half(pid) => Ok(()),
        _ => anyhow::bail!("Invalid USB id '{usb_id}': expected 0xVVVV/0xPPPP"),
    }
}

/// Expand `~` and environment variables in a user-supplied path
pub fn expand_path(value: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(value).context("Failed to expand path")?;
    Ok(PathBuf::from(expanded.as_ref()))
}

// =============================================================================
// Config subcommands
// =============================================================================

pub fn run_config_command(command: ConfigCommands, config_file: Option<&Path>) -> Result<()> {
    match command {
        ConfigCommands::Show => cmd_config_show(config_file),
        ConfigCommands::Set { key, value } => cmd_config_set(config_file, &key, &value),
        ConfigCommands::Init { force } => cmd_config_init(config_file, force),
        ConfigCommands::Path => cmd_config_path(config_file),
    }
}

fn resolve_config_path(config_file: Option<&Path>) -> Result<PathBuf> {
    config_file.map_or_else(SignerConfig::config_path, |p| Ok(p.to_path_buf()))
}

/// Show current configuration
fn cmd_config_show(config_file: Option<&Path>) -> Result<()> {
    let config = SignerConfig::load(config_file)?;
    let config_path = resolve_config_path(config_file)?;
    let board = &config.board;

    println!();
    println!("{}", "Current configuration:".bold());
    println!("  Board ID:        {}", board.board_id);
    println!("  Board Revision:  {}", board.board_revision);
    println!("  Summary:         {}", board.summary);
    println!("  Description:     {}", board.description);
    println!("  Version:         {}", board.version);
    println!("  Flash Size:      {} bytes", board.flash_total);
    println!("  USB ID:          {}", board.usb_id);
    if board.git_identity.is_empty() {
        println!("  Git Identity:    {}", "(from git)".dimmed());
    } else {
        println!("  Git Identity:    {}", board.git_identity);
    }
    match &config.key_path {
        Some(path) if !path.as_os_str().is_empty() => {
            println!("  Signing Key:     {}", path.display());
        }
        _ => println!("  Signing Key:     {}", "(unsigned)".dimmed()),
    }
    println!();
    if config_path.exists() {
        println!(
            "Config file: {}",
            config_path.display().to_string().dimmed()
        );
    } else {
        println!(
            "Config file: {} {}",
            config_path.display().to_string().dimmed(),
            "(not created, using defaults)".dimmed()
        );
    }
    println!();

    Ok(())
}

/// Set a configuration value
fn cmd_config_set(config_file: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let config_path = resolve_config_path(config_file)?;
    let mut config = SignerConfig::load(config_file)?;
    set_value(&mut config, key, value)?;
    config.validate()?;
    config.save_to(&config_path)?;

    println!("{} Set {} = {}", "✓".green(), key.bold(), value);
    Ok(())
}

fn set_value(config: &mut SignerConfig, key: &str, value: &str) -> Result<()> {
    let board = &mut config.board;
    match key {
        "board-id" => {
            board.board_id = value
                .parse()
                .with_context(|| format!("Invalid board id: {value}"))?;
        }
        "board-revision" => {
            board.board_revision = value
                .parse()
                .with_context(|| format!("Invalid board revision: {value}"))?;
        }
        "flash-total" => {
            board.flash_total = value
                .parse()
                .with_context(|| format!("Invalid flash size: {value}"))?;
        }
        "description" => board.description = value.to_string(),
        "summary" => board.summary = value.to_string(),
        "fw-version" => board.version = value.to_string(),
        "git-identity" => board.git_identity = value.to_string(),
        "usb-id" => {
            validate_usb_id(value)?;
            board.usb_id = value.to_string();
        }
        "key-path" => {
            config.key_path = if value.is_empty() {
                None
            } else {
                Some(expand_path(value)?)
            };
        }
        _ => {
            anyhow::bail!(
                "Unknown configuration key: {key}\nValid keys: board-id, board-revision, flash-total, description, summary, fw-version, git-identity, usb-id, key-path"
            );
        }
    }
    Ok(())
}

/// Write the built-in profile as a starting point
fn cmd_config_init(config_file: Option<&Path>, force: bool) -> Result<()> {
    let config_path = resolve_config_path(config_file)?;
    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}\nUse --force to overwrite it.",
            config_path.display()
        );
    }

    SignerConfig::default().save_to(&config_path)?;
    println!(
        "{} Wrote default configuration to {}",
        "✓".green(),
        config_path.display()
    );
    Ok(())
}

/// Show configuration file path
fn cmd_config_path(config_file: Option<&Path>) -> Result<()> {
    println!("{}", resolve_config_path(config_file)?.display());
    Ok(())
}
