/*
 * @file params.rs
 * @brief Typed XBee configuration parameters and their AT encodings
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

//! XBee register values, their AT command encodings and reply parsing.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors raised while turning user input into parameter values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("PAN ID must not be empty")]
    EmptyPanId,
    #[error("PAN ID '{0}' is not a hexadecimal number")]
    InvalidPanId(String),
    #[error("PAN ID '{0}' is out of range (max FFFFFFFF)")]
    PanIdOutOfRange(String),
    #[error("unsupported baud rate {0}")]
    UnsupportedBaudRate(u32),
    #[error("'{0}' is not a baud rate")]
    InvalidBaudRate(String),
    #[error("'{0}' is not a valid flag value (expected 0 or 1)")]
    InvalidFlag(String),
}

/// Interface data rates the BD register can select.
///
/// # Details
/// The module stores the rate as an index 0..=8; the enum discriminant is
/// that index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u32")]
pub enum BaudRate {
    B1200 = 0,
    B2400 = 1,
    B4800 = 2,
    B9600 = 3,
    B19200 = 4,
    B38400 = 5,
    B57600 = 6,
    B115200 = 7,
    B230400 = 8,
}

impl BaudRate {
    /// Every supported rate in BD index order.
    pub const ALL: [BaudRate; 9] = [
        BaudRate::B1200,
        BaudRate::B2400,
        BaudRate::B4800,
        BaudRate::B9600,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B57600,
        BaudRate::B115200,
        BaudRate::B230400,
    ];

    /// Order in which auto-detection probes rates, most common first.
    pub const DETECTION_ORDER: [BaudRate; 9] = [
        BaudRate::B9600,
        BaudRate::B115200,
        BaudRate::B57600,
        BaudRate::B38400,
        BaudRate::B19200,
        BaudRate::B4800,
        BaudRate::B2400,
        BaudRate::B1200,
        BaudRate::B230400,
    ];

    /// Looks up the rate stored at a BD index.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    /// Returns the BD index for this rate.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Looks up a rate by its bits-per-second value.
    pub fn from_bps(bps: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|rate| rate.bps() == bps)
    }

    /// Returns the rate in bits per second.
    pub fn bps(self) -> u32 {
        match self {
            BaudRate::B1200 => 1_200,
            BaudRate::B2400 => 2_400,
            BaudRate::B4800 => 4_800,
            BaudRate::B9600 => 9_600,
            BaudRate::B19200 => 19_200,
            BaudRate::B38400 => 38_400,
            BaudRate::B57600 => 57_600,
            BaudRate::B115200 => 115_200,
            BaudRate::B230400 => 230_400,
        }
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> Self {
        rate.bps()
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = ParamError;

    fn try_from(bps: u32) -> Result<Self, Self::Error> {
        Self::from_bps(bps).ok_or(ParamError::UnsupportedBaudRate(bps))
    }
}

impl std::str::FromStr for BaudRate {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bps: u32 = s
            .trim()
            .parse()
            .map_err(|_| ParamError::InvalidBaudRate(s.trim().to_string()))?;
        Self::try_from(bps)
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bps())
    }
}

/// Personal area network identifier (ID register).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PanId(pub u32);

impl PanId {
    /// Parses a PAN ID from hexadecimal text.
    ///
    /// # Details
    /// Accepts an optional `0x`/`0X` prefix and either letter case.
    /// Surrounding whitespace is ignored.
    ///
    /// # Arguments
    /// * `text` - User supplied hexadecimal string.
    ///
    /// # Returns
    /// * `Ok(PanId)` - The parsed identifier.
    ///
    /// # Errors
    /// Returns [`ParamError`] for empty input, non-hex characters, or values
    /// above `0xFFFFFFFF`.
    pub fn parse_hex(text: &str) -> Result<Self, ParamError> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() {
            return Err(ParamError::EmptyPanId);
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParamError::InvalidPanId(trimmed.to_string()));
        }
        u32::from_str_radix(digits, 16)
            .map(PanId)
            .map_err(|_| ParamError::PanIdOutOfRange(trimmed.to_string()))
    }
}

impl std::str::FromStr for PanId {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

impl fmt::Display for PanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X} (DEC: {})", self.0, self.0)
    }
}

/// Parses a 0/1 flag argument.
fn parse_flag(text: &str) -> Result<bool, ParamError> {
    match text.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(ParamError::InvalidFlag(other.to_string())),
    }
}

/// Coordinator enable (CE register).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinatorEnable {
    Disabled,
    Enabled,
}

impl CoordinatorEnable {
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Disabled),
            1 => Some(Self::Enabled),
            _ => None,
        }
    }

    pub fn value(self) -> u8 {
        match self {
            Self::Disabled => 0,
            Self::Enabled => 1,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::Enabled => "Enabled",
        }
    }
}

impl std::str::FromStr for CoordinatorEnable {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if parse_flag(s)? {
            Self::Enabled
        } else {
            Self::Disabled
        })
    }
}

/// API enable (AP register).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    Transparent,
    Api,
}

impl ApiMode {
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Transparent),
            1 => Some(Self::Api),
            _ => None,
        }
    }

    pub fn value(self) -> u8 {
        match self {
            Self::Transparent => 0,
            Self::Api => 1,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Transparent => "Transparent Mode",
            Self::Api => "API Enabled",
        }
    }
}

impl std::str::FromStr for ApiMode {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if parse_flag(s)? { Self::Api } else { Self::Transparent })
    }
}

/// Channel verification (JV register).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelVerification {
    Disabled,
    Enabled,
}

impl ChannelVerification {
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Disabled),
            1 => Some(Self::Enabled),
            _ => None,
        }
    }

    pub fn value(self) -> u8 {
        match self {
            Self::Disabled => 0,
            Self::Enabled => 1,
        }
    }
}

impl std::str::FromStr for ChannelVerification {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if parse_flag(s)? {
            Self::Enabled
        } else {
            Self::Disabled
        })
    }
}

/// A single writable register together with the value to store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parameter {
    PanId(PanId),
    ChannelVerification(ChannelVerification),
    BaudRate(BaudRate),
    CoordinatorEnable(CoordinatorEnable),
    ApiMode(ApiMode),
}

impl Parameter {
    /// Two-letter AT mnemonic of the register.
    pub fn register(&self) -> &'static str {
        match self {
            Parameter::PanId(_) => "ID",
            Parameter::ChannelVerification(_) => "JV",
            Parameter::BaudRate(_) => "BD",
            Parameter::CoordinatorEnable(_) => "CE",
            Parameter::ApiMode(_) => "AP",
        }
    }

    /// Argument text appended to the mnemonic when writing.
    ///
    /// # Details
    /// The module parses every argument as hexadecimal, so the PAN ID is
    /// rendered in upper-case hex and the small registers as their digit.
    pub fn argument(&self) -> String {
        match self {
            Parameter::PanId(id) => format!("{:X}", id.0),
            Parameter::ChannelVerification(jv) => jv.value().to_string(),
            Parameter::BaudRate(rate) => rate.index().to_string(),
            Parameter::CoordinatorEnable(ce) => ce.value().to_string(),
            Parameter::ApiMode(ap) => ap.value().to_string(),
        }
    }

    /// Numeric value the register should report after the write.
    pub fn expected_value(&self) -> u32 {
        match self {
            Parameter::PanId(id) => id.0,
            Parameter::ChannelVerification(jv) => u32::from(jv.value()),
            Parameter::BaudRate(rate) => u32::from(rate.index()),
            Parameter::CoordinatorEnable(ce) => u32::from(ce.value()),
            Parameter::ApiMode(ap) => u32::from(ap.value()),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::PanId(id) => write!(f, "PAN ID {}", id),
            Parameter::ChannelVerification(jv) => write!(f, "JV {}", jv.value()),
            Parameter::BaudRate(rate) => {
                write!(f, "Baud Rate {} (index {})", rate, rate.index())
            }
            Parameter::CoordinatorEnable(ce) => {
                write!(f, "CE {} ({})", ce.value(), ce.describe())
            }
            Parameter::ApiMode(ap) => write!(f, "AP {} ({})", ap.value(), ap.describe()),
        }
    }
}

/// Complete register set written by a bulk write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub pan_id: PanId,
    pub channel_verification: ChannelVerification,
    pub baud_rate: BaudRate,
    pub coordinator_enable: CoordinatorEnable,
    pub api_mode: ApiMode,
}

impl Settings {
    /// Registers in write order; BD is last because changing it can cut the
    /// link.
    pub fn parameters(&self) -> [Parameter; 5] {
        [
            Parameter::PanId(self.pan_id),
            Parameter::ChannelVerification(self.channel_verification),
            Parameter::CoordinatorEnable(self.coordinator_enable),
            Parameter::ApiMode(self.api_mode),
            Parameter::BaudRate(self.baud_rate),
        ]
    }
}

/// Parameters read back from a module.
///
/// # Details
/// Any register whose reply could not be parsed is `None` and shown as
/// `N/A`; a read never fails because of one bad reply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Readings {
    pub mac_address: String,
    pub pan_id: Option<PanId>,
    pub pan_id_raw: String,
    pub channel_verification: Option<u8>,
    pub baud_rate_index: Option<u8>,
    pub baud_rate: Option<BaudRate>,
    pub coordinator_enable: Option<u8>,
    pub api_mode: Option<u8>,
}

const NOT_AVAILABLE: &str = "N/A";

impl fmt::Display for Readings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MAC Address : {}", self.mac_address)?;
        match self.pan_id {
            Some(id) => writeln!(f, "PAN ID      : {}", id)?,
            None => writeln!(f, "PAN ID      : {}", NOT_AVAILABLE)?,
        }
        writeln!(f, "JV          : {}", optional(self.channel_verification))?;
        match (self.baud_rate, self.baud_rate_index) {
            (Some(rate), _) => writeln!(f, "Baud Rate   : {}", rate)?,
            (None, Some(index)) => writeln!(f, "Baud Rate   : Unknown (index {})", index)?,
            (None, None) => writeln!(f, "Baud Rate   : {}", NOT_AVAILABLE)?,
        }
        match self.coordinator_enable {
            Some(value) => writeln!(
                f,
                "CE          : {} ({})",
                value,
                CoordinatorEnable::from_value(value).map_or("Unknown", |ce| ce.describe())
            )?,
            None => writeln!(f, "CE          : {}", NOT_AVAILABLE)?,
        }
        match self.api_mode {
            Some(value) => write!(
                f,
                "AP          : {} ({})",
                value,
                ApiMode::from_value(value).map_or("Unknown", |ap| ap.describe())
            ),
            None => write!(f, "AP          : {}", NOT_AVAILABLE),
        }
    }
}

fn optional(value: Option<u8>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

/// Removes line terminators and surrounding whitespace from a reply.
pub fn clean_reply(reply: &str) -> String {
    reply.replace(['\r', '\n'], "").trim().to_string()
}

/// Parses a hexadecimal register reply.
///
/// # Returns
/// * `Some(u32)` - The register value.
/// * `None` - The reply was empty or not hexadecimal.
pub fn parse_register(reply: &str) -> Option<u32> {
    let cleaned = clean_reply(reply);
    if cleaned.is_empty() {
        return None;
    }
    u32::from_str_radix(&cleaned, 16).ok()
}

/// Parses a one-byte register reply such as JV, CE or AP.
pub fn parse_small_register(reply: &str) -> Option<u8> {
    parse_register(reply).and_then(|value| u8::try_from(value).ok())
}

/// Parses an ID reply; an empty reply is PAN ID 0.
pub fn parse_pan_id_reply(reply: &str) -> Option<PanId> {
    let cleaned = clean_reply(reply);
    if cleaned.is_empty() {
        return Some(PanId(0));
    }
    u32::from_str_radix(&cleaned, 16).ok().map(PanId)
}

/// Joins the SH and SL replies into a 16 digit MAC address.
pub fn join_mac_address(high: &str, low: &str) -> String {
    format!(
        "{:0>8}{:0>8}",
        clean_reply(high).to_uppercase(),
        clean_reply(low).to_uppercase()
    )
}
