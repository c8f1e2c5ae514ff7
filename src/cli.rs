//! Command-line argument parsing
//!
//! ```text
//! potion-blast bridge [--source PATH] [--listen ADDR] [--config FILE]
//! potion-blast play   [--url URL] [--seed N] [--config FILE]
//! ```

use std::fmt;
use std::path::PathBuf;

use crate::settings::Settings;

/// Which half of the system to run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Read sensor frames and serve them over WebSocket
    Bridge,
    /// Subscribe to a bridge and play headless
    Play,
}

impl Mode {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "bridge" => Some(Mode::Bridge),
            "play" => Some(Mode::Play),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Bridge => "bridge",
            Mode::Play => "play",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed command-line arguments
#[derive(Debug, Default, PartialEq)]
pub struct CliArgs {
    pub mode: Option<Mode>,
    pub config: Option<PathBuf>,
    pub source: Option<PathBuf>,
    pub listen: Option<String>,
    pub url: Option<String>,
    pub seed: Option<u64>,
    pub show_help: bool,
}

/// Bad command line
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum CliError {
    #[error("unknown argument: {0}")]
    Unknown(String),
    #[error("{0} requires a value")]
    MissingValue(&'static str),
    #[error("invalid seed: {0}")]
    InvalidSeed(String),
}

impl CliArgs {
    /// Parse the process arguments
    pub fn parse() -> Result<Self, CliError> {
        Self::parse_from(std::env::args().skip(1))
    }

    pub fn parse_from<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Self::default();
        let mut iter = args.into_iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => parsed.show_help = true,
                "--config" | "-c" => {
                    parsed.config = Some(iter.next().ok_or(CliError::MissingValue("--config"))?.into());
                }
                "--source" => {
                    parsed.source = Some(iter.next().ok_or(CliError::MissingValue("--source"))?.into());
                }
                "--listen" => {
                    parsed.listen = Some(iter.next().ok_or(CliError::MissingValue("--listen"))?);
                }
                "--url" => {
                    parsed.url = Some(iter.next().ok_or(CliError::MissingValue("--url"))?);
                }
                "--seed" => {
                    let value = iter.next().ok_or(CliError::MissingValue("--seed"))?;
                    parsed.seed = Some(value.parse().map_err(|_| CliError::InvalidSeed(value))?);
                }
                other => match Mode::from_str(other) {
                    Some(mode) if parsed.mode.is_none() => parsed.mode = Some(mode),
                    _ => return Err(CliError::Unknown(other.to_string())),
                },
            }
        }

        Ok(parsed)
    }

    /// Apply flag overrides on top of file settings
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(source) = &self.source {
            settings.source = source.clone();
        }
        if let Some(listen) = &self.listen {
            settings.listen_addr = listen.clone();
        }
        if let Some(url) = &self.url {
            settings.bridge_url = url.clone();
        }
        if self.seed.is_some() {
            settings.seed = self.seed;
        }
    }
}

pub fn print_usage() {
    println!("Potion Blast - glove-controlled bubble matching");
    println!();
    println!("Usage:");
    println!("  potion-blast bridge [--source PATH] [--listen ADDR] [--config FILE]");
    println!("  potion-blast play   [--url URL] [--seed N] [--config FILE]");
    println!();
    println!("Options:");
    println!("  --source PATH   Sensor link (device, FIFO or file; '-' for stdin)");
    println!("  --listen ADDR   WebSocket listen address (default 0.0.0.0:8080)");
    println!("  --url URL       Bridge URL to subscribe to (default ws://localhost:8080)");
    println!("  --seed N        Bubble field seed");
    println!("  --config FILE   JSON settings file");
    println!("  -h, --help      Show this help");
    println!();
    println!("Set RUST_LOG=debug for per-reading logs.");
}
