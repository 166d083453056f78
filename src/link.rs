/*
 * @file link.rs
 * @brief Serial transport used to reach the XBee module
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

//! Byte transport between the host and the XBee module.

use std::io::{self, Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, SerialPort, SerialPortType};

/// Read timeout applied to every opened port.
const SERIAL_TIMEOUT: Duration = Duration::from_secs(2);

/// Minimal transport the AT session needs.
///
/// # Details
/// Implemented for real serial ports and for the in-crate simulator used by
/// tests, so the protocol code never touches `serialport` directly.
pub trait Link {
    /// Writes all bytes and flushes them to the wire.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
    /// Number of received bytes waiting to be read.
    fn pending(&mut self) -> io::Result<usize>;
    /// Reads up to `buf.len()` received bytes.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// Reconfigures the line speed.
    fn set_baud_rate(&mut self, baud: u32) -> io::Result<()>;
    /// Discards anything buffered in either direction.
    fn clear_buffers(&mut self) -> io::Result<()>;
}

impl Link for Box<dyn SerialPort> {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)?;
        self.flush()
    }

    fn pending(&mut self) -> io::Result<usize> {
        let count = self.bytes_to_read()?;
        Ok(count as usize)
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }

    fn set_baud_rate(&mut self, baud: u32) -> io::Result<()> {
        SerialPort::set_baud_rate(&mut **self, baud)?;
        Ok(())
    }

    fn clear_buffers(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::All)?;
        Ok(())
    }
}

/// Number of data bits per character.
///
/// Deserializes from `8` or `"8"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DataBits {
    #[value(name = "5")]
    Five,
    #[value(name = "6")]
    Six,
    #[value(name = "7")]
    Seven,
    #[default]
    #[value(name = "8")]
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(format!("unsupported data bits {}, expected 5 to 8", other)),
        }
    }
}

impl<'de> Deserialize<'de> for DataBits {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = LineNumber::deserialize(deserializer)?
            .value()
            .map_err(de::Error::custom)?;
        DataBits::try_from(bits).map_err(de::Error::custom)
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Parity checking mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }
}

/// Number of stop bits.
///
/// Deserializes from `1` or `"1"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum StopBits {
    #[default]
    #[value(name = "1")]
    One,
    #[value(name = "2")]
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(format!("unsupported stop bits {}, expected 1 or 2", other)),
        }
    }
}

impl<'de> Deserialize<'de> for StopBits {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = LineNumber::deserialize(deserializer)?
            .value()
            .map_err(de::Error::custom)?;
        StopBits::try_from(bits).map_err(de::Error::custom)
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Small line setting written either as a JSON number or as text.
#[derive(Deserialize)]
#[serde(untagged)]
enum LineNumber {
    Number(u8),
    Text(String),
}

impl LineNumber {
    fn value(self) -> Result<u8, String> {
        match self {
            LineNumber::Number(value) => Ok(value),
            LineNumber::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| format!("expected a number, got {:?}", text)),
        }
    }
}

/// Everything needed to open the serial port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerialSettings {
    pub path: String,
    pub baud: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

/// One serial port found on the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PortEntry {
    pub device: String,
    pub description: String,
}

/// Opens the configured serial port, falling back to the callout device.
///
/// # Details
/// On macOS a module shows up as both `/dev/tty.*` and `/dev/cu.*`; when the
/// tty device cannot be opened the callout variant is tried. DTR and RTS are
/// asserted once the port is open.
///
/// # Arguments
/// * `settings` - Path and line parameters.
///
/// # Returns
/// * `Ok(Box<dyn SerialPort>)` - Configured port ready for use.
///
/// # Errors
/// Returns the error of the primary path if neither path can be opened.
pub fn open(settings: &SerialSettings) -> Result<Box<dyn SerialPort>> {
    let mut port = match open_serial_port(&settings.path, settings) {
        Ok(port) => port,
        Err(primary_err) => {
            let Some(callout) = callout_variant(&settings.path) else {
                return Err(primary_err);
            };
            match open_serial_port(&callout, settings) {
                Ok(port) => {
                    log::warn!(
                        "Primary port {} unavailable, switching to {}",
                        settings.path,
                        callout
                    );
                    port
                }
                Err(_) => return Err(primary_err),
            }
        }
    };
    configure_port_signals(&mut port);
    log::info!(
        "Connected to {} ({} baud, {:?}, parity {:?}, stop bits {:?})",
        settings.path,
        settings.baud,
        settings.data_bits,
        settings.parity,
        settings.stop_bits
    );
    Ok(port)
}

fn open_serial_port(path: &str, settings: &SerialSettings) -> Result<Box<dyn SerialPort>> {
    serialport::new(path, settings.baud)
        .data_bits(settings.data_bits.into())
        .parity(settings.parity.into())
        .stop_bits(settings.stop_bits.into())
        .flow_control(serialport::FlowControl::None)
        .timeout(SERIAL_TIMEOUT)
        .open()
        .with_context(|| format!("Failed to open {}", path))
}

fn configure_port_signals(port: &mut Box<dyn SerialPort>) {
    let dtr = port.write_data_terminal_ready(true);
    let rts = port.write_request_to_send(true);
    for warning in signal_failures(dtr, rts) {
        log::warn!("{}", warning);
    }
}

/// Describes which of the DTR and RTS writes failed.
fn signal_failures(dtr: serialport::Result<()>, rts: serialport::Result<()>) -> Vec<String> {
    [("DTR", dtr), ("RTS", rts)]
        .into_iter()
        .filter_map(|(signal, result)| {
            result
                .err()
                .map(|err| format!("Failed to assert {}: {}", signal, err))
        })
        .collect()
}

/// Converts a `/dev/tty.*` path to its `/dev/cu.*` callout variant.
fn callout_variant(path: &str) -> Option<String> {
    let suffix = path.strip_prefix("/dev/tty.")?;
    Some(format!("/dev/cu.{}", suffix))
}

/// Enumerates the serial ports present on the host.
///
/// # Errors
/// Returns an error if the platform port enumeration fails.
pub fn list_ports() -> Result<Vec<PortEntry>> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    Ok(ports
        .into_iter()
        .map(|info| PortEntry {
            description: describe_port(&info.port_type),
            device: info.port_name,
        })
        .collect())
}

fn describe_port(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let label = [usb.product.as_deref(), usb.manufacturer.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" / ");
            if label.is_empty() {
                format!("USB {:04x}:{:04x}", usb.vid, usb.pid)
            } else {
                label
            }
        }
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::Unknown => "Unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn callout_variant_rewrites_tty_devices() {
        assert_eq!(
            callout_variant("/dev/tty.usbserial-A50285BI"),
            Some("/dev/cu.usbserial-A50285BI".to_string())
        );
        assert_eq!(callout_variant("/dev/ttyUSB0"), None);
        assert_eq!(callout_variant("COM3"), None);
    }

    #[test]
    fn usb_ports_are_described_by_product() {
        let info = SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x0403,
            pid: 0x6015,
            serial_number: None,
            manufacturer: Some("FTDI".to_string()),
            product: Some("FT231X USB UART".to_string()),
        });
        assert_eq!(describe_port(&info), "FT231X USB UART / FTDI");
    }

    #[test]
    fn anonymous_usb_ports_fall_back_to_ids() {
        let info = SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x0403,
            pid: 0x6015,
            serial_number: None,
            manufacturer: None,
            product: None,
        });
        assert_eq!(describe_port(&info), "USB 0403:6015");
    }

    #[test]
    fn line_settings_map_onto_serialport() {
        assert_eq!(serialport::DataBits::from(DataBits::Seven), serialport::DataBits::Seven);
        assert_eq!(serialport::Parity::from(Parity::Even), serialport::Parity::Even);
        assert_eq!(serialport::StopBits::from(StopBits::Two), serialport::StopBits::Two);
    }

    #[test]
    fn failed_signal_writes_are_reported() {
        let broken = serialport::Error::new(serialport::ErrorKind::NoDevice, "unplugged");
        assert!(signal_failures(Ok(()), Ok(())).is_empty());
        assert_eq!(
            signal_failures(Ok(()), Err(broken)),
            ["Failed to assert RTS: unplugged"]
        );
    }

    #[test]
    fn line_numbers_accept_numbers_and_text() {
        let bits: DataBits = serde_json::from_str("7").unwrap();
        assert_eq!(bits, DataBits::Seven);
        let bits: DataBits = serde_json::from_str("\"6\"").unwrap();
        assert_eq!(bits, DataBits::Six);
        let stop: StopBits = serde_json::from_str("2").unwrap();
        assert_eq!(stop, StopBits::Two);
        assert!(serde_json::from_str::<DataBits>("9").is_err());
        assert!(serde_json::from_str::<StopBits>("\"one\"").is_err());
    }
}
