//! Process settings
//!
//! Read from an optional JSON file at startup; command-line flags override
//! individual values. Missing keys take their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Settings for both the bridge and the play session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Bridge ===
    /// Sensor link: device node, FIFO or file; `-` for stdin
    pub source: PathBuf,
    /// Address the WebSocket server listens on
    pub listen_addr: String,

    // === Play ===
    /// Bridge endpoint the game subscribes to
    pub bridge_url: String,
    /// Bubble field seed (random when absent)
    pub seed: Option<u64>,
    /// Simulation frames per second
    pub frame_rate: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: PathBuf::from("/dev/ttyUSB0"),
            listen_addr: "0.0.0.0:8080".to_string(),
            bridge_url: "ws://localhost:8080".to_string(),
            seed: None,
            frame_rate: 60,
        }
    }
}

impl Settings {
    /// Parse settings from JSON text
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load settings from a JSON file, falling back to defaults
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    return settings;
                }
                Err(e) => log::warn!("Ignoring invalid settings in {}: {}", path.display(), e),
            },
            Err(e) => log::info!("No settings at {} ({}), using defaults", path.display(), e),
        }
        Self::default()
    }

    /// Length of one simulation frame
    pub fn frame_ms(&self) -> u64 {
        (1000 / self.frame_rate.max(1) as u64).max(1)
    }
}
