use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;

use crate::{
    config::Config,
    discovery::{self, Discovery},
    error::Error,
    session::SessionOptions,
};

/// Send operations to an FPGA ALU over a serial line and show what it answers.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Use this device instead of scanning for one
    #[arg(long)]
    pub device: Option<PathBuf>,

    /// Baud rate to open the device with (9600 or 115200)
    #[arg(long)]
    pub baud: Option<u32>,

    /// Apply the configured line settings without asking
    #[arg(long)]
    pub accept: bool,

    /// Talk to a simulated FPGA instead of a device
    #[arg(long)]
    pub mock: bool,

    /// Also log to a daily rotated file in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Level for the log file
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Commands available in the command line interface.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// List the devices that would be offered, with their USB details.
    List,

    /// Show an example of a configuration file's contents.
    ConfigExample,
}

impl Cli {
    /// The configuration file's contents, or the defaults without one.
    pub fn load_config(&self) -> Result<Config, Error> {
        match &self.config {
            Some(path) => Config::new_from_path(path),
            None => Ok(Config::default()),
        }
    }

    /// What a session started from these arguments should do.
    pub fn session_options(&self, config: Config) -> SessionOptions {
        SessionOptions {
            config,
            device: self.device.clone(),
            baud: self.baud,
            accept: self.accept,
            mock: self.mock,
        }
    }
}

/// Run a subcommand to completion, returning what it prints.
pub fn handle_command(command: Commands, config: &Config) -> Result<String, Error> {
    match command {
        Commands::ConfigExample => Config::example().serialize_pretty(),
        Commands::List => {
            let discovery = Discovery::new(config.device_families.clone());
            let candidates = discovery.scan();

            if candidates.is_empty() {
                let families = discovery
                    .families()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" or ");
                return Ok(format!("No serial devices found ({families})."));
            }

            let mut listing = String::new();
            for (index, path) in candidates.paths().iter().enumerate() {
                listing.push_str(&format!("[{index}] {}\n", path.display()));
                if let Some(info) = discovery::device_info(path) {
                    listing.push_str(&format!("   {info}\n"));
                }
            }

            Ok(listing.trim_end().to_owned())
        }
    }
}
