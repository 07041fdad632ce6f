// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving gateway settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "hfp-gateway";

/// Gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for the phonebook database.
    #[serde(skip)]
    pub data_dir: PathBuf,

    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Protocol engine settings.
    pub engine: EngineConfig,

    /// Phonebook settings.
    pub phonebook: PhonebookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Adapter alias shown to peers.
    pub device_name: String,

    /// RFCOMM channel of the hands-free audio gateway service.
    pub handsfree_channel: u8,

    /// RFCOMM channel of the headset audio gateway service.
    pub headset_channel: u8,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            device_name: "HFP Gateway".to_string(),
            handsfree_channel: 13,
            headset_channel: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Interval between repeated `RING`s.
    pub ring_interval_ms: u64,

    /// How long a dial waits for the call to start.
    pub call_start_timeout_ms: u64,

    /// Interval between repeated `+CCWA`s.
    pub call_waiting_display_ms: u64,

    /// How long multi-call operations stay locked after `+CHLD`.
    pub add_call_reenable_ms: u64,

    /// Concurrent calls numbered in `+CLCC`.
    pub max_call_lines: usize,

    pub manufacturer: String,
    pub model: String,
    pub revision: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ring_interval_ms: 3000,
            call_start_timeout_ms: 10_000,
            call_waiting_display_ms: 3000,
            add_call_reenable_ms: 1000,
            max_call_lines: 3,
            manufacturer: "Linux".to_string(),
            model: "hfp-gateway".to_string(),
            revision: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl EngineConfig {
    pub fn ring_interval(&self) -> Duration {
        Duration::from_millis(self.ring_interval_ms)
    }

    pub fn call_start_timeout(&self) -> Duration {
        Duration::from_millis(self.call_start_timeout_ms)
    }

    pub fn call_waiting_display(&self) -> Duration {
        Duration::from_millis(self.call_waiting_display_ms)
    }

    pub fn add_call_reenable(&self) -> Duration {
        Duration::from_millis(self.add_call_reenable_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhonebookConfig {
    /// Maximum rows returned from each call log.
    pub call_log_limit: usize,
}

impl Default for PhonebookConfig {
    fn default() -> Self {
        Self {
            call_log_limit: 100,
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Config {
    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        let config_dir = config_dir();
        std::fs::create_dir_all(&config_dir)?;

        let mut config = Self::load_from(&config_dir.join("config.toml"))?;

        config.data_dir = data_dir();
        std::fs::create_dir_all(&config.data_dir)?;

        Ok(config)
    }

    /// Load from `path`, writing the defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            let content = toml::to_string_pretty(&config)?;
            std::fs::write(path, content)?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_written_on_first_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.engine.ring_interval_ms, 3000);
        assert_eq!(config.engine.max_call_lines, 3);
        assert_eq!(config.bluetooth.handsfree_channel, 13);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[engine]\nring_interval_ms = 1500\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.engine.ring_interval(), Duration::from_millis(1500));
        assert_eq!(config.engine.call_start_timeout_ms, 10_000);
        assert_eq!(config.phonebook.call_log_limit, 100);
    }
}
