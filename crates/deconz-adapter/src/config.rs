//! Adapter configuration

use crate::error::AdapterError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

fn default_baud_rate() -> u32 {
    deconz_driver::DEFAULT_BAUD_RATE
}

fn default_concurrent() -> usize {
    2
}

/// Serial port settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialPortOptions {
    /// Path to the serial device
    pub path: String,
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Adapter tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterOptions {
    /// Maximum concurrent driver submissions
    #[serde(default = "default_concurrent")]
    pub concurrent: usize,
    /// Inter-submission pacing in milliseconds; at 200 ms or more, APS ACKs
    /// are requested on every transmission
    #[serde(default)]
    pub delay_ms: u64,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            concurrent: default_concurrent(),
            delay_ms: 0,
        }
    }
}

/// Desired network parameters, reconciled against the radio at start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkOptions {
    pub pan_id: u16,
    pub extended_pan_id: [u8; 8],
    pub network_key: [u8; 16],
    /// The first entry is the desired channel (11..=26)
    pub channel_list: Vec<u8>,
}

impl NetworkOptions {
    /// The desired operating channel
    #[must_use]
    pub fn channel(&self) -> u8 {
        self.channel_list.first().copied().unwrap_or(11)
    }
}

/// Full adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub serial_port: SerialPortOptions,
    #[serde(default)]
    pub adapter: AdapterOptions,
    pub network: NetworkOptions,
}

impl Config {
    /// Load configuration from a JSON file
    pub async fn load(path: &Path) -> Result<Self, AdapterError> {
        let contents = fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&contents)?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }
}

/// Convert an operating channel to its channel-mask bit.
///
/// Only the 2.4 GHz channels 11..=26 are valid; anything else maps to an
/// empty mask.
#[must_use]
pub fn channel_to_mask(channel: u8) -> u32 {
    if (11..=26).contains(&channel) {
        1u32 << channel
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_mask_covers_valid_range() {
        for channel in 11..=26u8 {
            assert_eq!(channel_to_mask(channel), 1u32 << channel);
        }
    }

    #[test]
    fn channel_mask_zero_outside_range() {
        for channel in [0u8, 1, 10, 27, 42, 255] {
            assert_eq!(channel_to_mask(channel), 0);
        }
    }

    #[test]
    fn config_parses_with_defaults() {
        let json = r#"{
            "serial_port": { "path": "/dev/ttyUSB0" },
            "network": {
                "pan_id": 6754,
                "extended_pan_id": [221, 221, 221, 221, 221, 221, 221, 221],
                "network_key": [1, 3, 5, 7, 9, 11, 13, 15, 0, 2, 4, 6, 8, 10, 12, 13],
                "channel_list": [15]
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.serial_port.baud_rate, 38400);
        assert_eq!(config.adapter.concurrent, 2);
        assert_eq!(config.adapter.delay_ms, 0);
        assert_eq!(config.network.channel(), 15);
        assert_eq!(config.network.pan_id, 6754);
    }
}
