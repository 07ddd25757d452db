use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod constants;
mod inspect;
mod sign;
mod utils;

/// Sign firmware images and package them as APJ containers
#[derive(Parser, Debug)]
#[command(name = "apjsign")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.config/apjsign/config.json)
    #[arg(long = "config", global = true, value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Display detailed diagnostic information
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign a firmware image and write an APJ envelope
    Sign {
        /// Compiled firmware binary (e.g., build/CubeOrange/bin/arducopter.bin)
        #[arg(long, short)]
        image: PathBuf,

        /// PEM P-256 private key; pass an empty string to skip signing
        #[arg(long, short)]
        key: Option<String>,

        /// Output file (default: image path with .apj extension)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Board identifier
        #[arg(long)]
        board_id: Option<u32>,

        /// Board revision
        #[arg(long)]
        board_revision: Option<u32>,

        /// Human-readable firmware description
        #[arg(long)]
        description: Option<String>,

        /// Short board name (e.g., CubeOrange)
        #[arg(long)]
        summary: Option<String>,

        /// Firmware version string
        #[arg(long)]
        fw_version: Option<String>,

        /// Total flash size in bytes
        #[arg(long)]
        flash_total: Option<u64>,

        /// Source revision (default: abbreviated git HEAD)
        #[arg(long)]
        git_identity: Option<String>,

        /// USB vendor/product id (e.g., 0x2dae/0x1016)
        #[arg(long)]
        usb_id: Option<String>,
    },
    /// Decode an APJ envelope and show its contents
    Inspect {
        /// APJ file to inspect
        apj: PathBuf,

        /// Write the decoded payload to this file
        #[arg(long)]
        extract: Option<PathBuf>,
    },
    /// Manage configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (board-id, board-revision, flash-total, description,
        /// summary, fw-version, git-identity, usb-id, key-path)
        key: String,
        /// Configuration value
        value: String,
    },
    /// Write the default board profile to the configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
    /// Show configuration file path
    Path,
}

fn init_logging(verbose: bool) {
    let log_level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        None => {
            // No subcommand provided, print help
            Cli::command().print_help()?;
            std::process::exit(0);
        }
        Some(Commands::Sign {
            image,
            key,
            output,
            board_id,
            board_revision,
            description,
            summary,
            fw_version,
            flash_total,
            git_identity,
            usb_id,
        }) => {
            sign::run(sign::SignOptions {
                image,
                key: key.map(PathBuf::from),
                output,
                config: cli.config_file,
                overrides: config::BoardOverrides {
                    board_id,
                    description,
                    summary,
                    fw_version,
                    flash_total,
                    git_identity,
                    board_revision,
                    usb_id,
                },
            })?;
        }
        Some(Commands::Inspect { apj, extract }) => {
            inspect::run(&apj, extract.as_deref())?;
        }
        Some(Commands::Config { command }) => {
            config::run_config_command(command, cli.config_file.as_deref())?;
        }
    }

    Ok(())
}
