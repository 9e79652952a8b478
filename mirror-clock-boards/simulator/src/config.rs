use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use mirror_clock_common::DeviceConfig;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Host side settings plus the device configuration the firmware would find
/// in its own storage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Address the HTTP server binds to.
    pub listen: String,
    /// Emulates a missing clock chip.
    pub rtc_detached: bool,
    /// Starts an unset clock from the host time.
    pub rtc_seed_from_host: bool,
    /// Status polls until the link comes up. `None` never associates.
    pub wifi_connect_after: Option<u32>,
    pub wifi_address: Ipv4Addr,
    pub flash_size: u32,
    /// Start of the slot that receives a new image.
    pub image_slot: u32,
    /// Mirrors the flash contents into this file.
    pub flash_file: Option<PathBuf>,
    pub device: DeviceConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        let mut device = DeviceConfig::default();
        device.network.ssid.push_str("simulated").ok();

        Self {
            listen: "127.0.0.1:8080".into(),
            rtc_detached: false,
            rtc_seed_from_host: true,
            wifi_connect_after: Some(3),
            wifi_address: Ipv4Addr::LOCALHOST,
            flash_size: 0x40_0000,
            image_slot: 0x20_0000,
            flash_file: None,
            device,
        }
    }
}

impl SimulatorConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn image_region_len(&self) -> u32 {
        self.flash_size.saturating_sub(self.image_slot)
    }
}
