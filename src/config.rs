/*
 * @file config.rs
 * @brief Runtime configuration for the XBee configurator
 * @author Kevin Thomas
 * @date 2025
 *
 * MIT License
 *
 * Copyright (c) 2025 Kevin Thomas
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! Configuration file loading with environment overrides.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::link::{DataBits, Parity, SerialSettings, StopBits};

/// Default path of the JSON configuration file.
pub const CONFIG_PATH: &str = "xbee-config.json";

/// Environment variable overriding the serial device.
const PORT_ENV: &str = "XBEE_SERIAL_PORT";

/// Environment variable overriding the line speed.
const BAUD_ENV: &str = "XBEE_SERIAL_BAUD";

/// Serial device used when nothing else is configured.
#[cfg(windows)]
const FALLBACK_SERIAL_PORT: &str = "COM1";
#[cfg(not(windows))]
const FALLBACK_SERIAL_PORT: &str = "/dev/ttyUSB0";

/// Factory default interface rate of XBee modules.
const DEFAULT_BAUD: u32 = 9_600;

/// Strongly typed representation of `xbee-config.json`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub serial_port: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub command_mode_retries: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            serial_port: FALLBACK_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD,
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            command_mode_retries: 0,
        }
    }
}

impl AppConfig {
    /// Builds serial settings from this configuration.
    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            path: self.serial_port.clone(),
            baud: self.baud_rate,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
        }
    }

    /// Applies `XBEE_SERIAL_PORT` and `XBEE_SERIAL_BAUD` overrides.
    ///
    /// # Details
    /// A baud override that does not parse as a number is ignored with a
    /// warning.
    ///
    /// # Arguments
    /// * `lookup` - Reads one environment variable; `std::env::var` in
    ///   production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(PORT_ENV) {
            self.serial_port = port;
        }
        if let Some(raw) = lookup(BAUD_ENV) {
            match raw.trim().parse() {
                Ok(baud) => self.baud_rate = baud,
                Err(_) => log::warn!("Ignoring {}={:?}: not a number", BAUD_ENV, raw),
            }
        }
    }
}

/// Loads configuration, falling back to defaults when the file is missing.
///
/// # Details
/// A missing file is normal and yields defaults silently. A file that
/// cannot be parsed is reported as a warning and also yields defaults.
///
/// # Arguments
/// * `path` - Location of the JSON file.
///
/// # Returns
/// * `AppConfig` - The loaded or default configuration.
pub fn load_app_config(path: &Path) -> AppConfig {
    match read_config_file(path) {
        Ok(Some(config)) => config,
        Ok(None) => AppConfig::default(),
        Err(err) => {
            log::warn!("Config load error ({}): {:#}", path.display(), err);
            AppConfig::default()
        }
    }
}

fn read_config_file(path: &Path) -> Result<Option<AppConfig>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()))
        }
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let config = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn temp_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "xbee-config-{}-{}.json",
            name,
            std::process::id()
        ));
        fs::write(&path, contents).expect("write temp config");
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("xbee-config-does-not-exist.json");
        assert_eq!(load_app_config(&path), AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let path = temp_config(
            "partial",
            r#"{ "serial_port": "/dev/ttyUSB3", "baud_rate": 115200, "parity": "even" }"#,
        );
        let config = load_app_config(&path);
        fs::remove_file(&path).ok();
        assert_eq!(config.serial_port, "/dev/ttyUSB3");
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.command_mode_retries, 0);
    }

    #[test]
    fn numeric_line_settings_are_accepted() {
        let path = temp_config(
            "numeric",
            r#"{ "serial_port": "/dev/ttyUSB3", "data_bits": 7, "stop_bits": 2 }"#,
        );
        let config = load_app_config(&path);
        fs::remove_file(&path).ok();
        assert_eq!(config.serial_port, "/dev/ttyUSB3");
        assert_eq!(config.data_bits, DataBits::Seven);
        assert_eq!(config.stop_bits, StopBits::Two);
    }

    #[test]
    fn unknown_keys_do_not_discard_the_file() {
        let path = temp_config(
            "unknown",
            r#"{ "serial_port": "/dev/ttyUSB3", "timeout": 2 }"#,
        );
        let config = load_app_config(&path);
        fs::remove_file(&path).ok();
        assert_eq!(config.serial_port, "/dev/ttyUSB3");
        assert_eq!(config.baud_rate, DEFAULT_BAUD);
    }

    #[test]
    fn line_settings_also_accept_text() {
        let path = temp_config("line", r#"{ "data_bits": "7", "stop_bits": "2" }"#);
        let config = load_app_config(&path);
        fs::remove_file(&path).ok();
        assert_eq!(config.data_bits, DataBits::Seven);
        assert_eq!(config.stop_bits, StopBits::Two);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let path = temp_config("invalid", "{ not json");
        let config = load_app_config(&path);
        fs::remove_file(&path).ok();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> =
            [("XBEE_SERIAL_PORT", "COM7"), ("XBEE_SERIAL_BAUD", "57600")].into();
        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.serial_port, "COM7");
        assert_eq!(config.serial_settings().baud, 57_600);
    }

    #[test]
    fn unparseable_baud_override_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(|key| (key == "XBEE_SERIAL_BAUD").then(|| "fast".to_string()));
        assert_eq!(config.baud_rate, DEFAULT_BAUD);
    }
}
