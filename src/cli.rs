/*
 * @file cli.rs
 * @brief Command-line interface of the XBee configurator
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

//! Argument parsing and subcommand dispatch.

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serialport::SerialPort;

use crate::at::{AtSession, Pacing};
use crate::config::{load_app_config, AppConfig, CONFIG_PATH};
use crate::device::{self, WriteOutcome};
use crate::link::{self, DataBits, Parity, PortEntry, StopBits};
use crate::params::{
    ApiMode, BaudRate, ChannelVerification, CoordinatorEnable, PanId, Parameter, Readings,
    Settings,
};

/// Delay before reading parameters back after a write.
const REREAD_DELAY: Duration = Duration::from_secs(1);

/// Read and write Digi XBee parameters in AT command mode.
#[derive(Debug, Parser)]
#[command(name = "xbee-config", version, about)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Serial device the module is attached to
    #[arg(short, long, global = true)]
    pub port: Option<String>,
    /// Line speed used to talk to the module
    #[arg(short, long, global = true)]
    pub baud: Option<u32>,
    #[arg(long, global = true, value_enum)]
    pub data_bits: Option<DataBits>,
    #[arg(long, global = true, value_enum)]
    pub parity: Option<Parity>,
    #[arg(long, global = true, value_enum)]
    pub stop_bits: Option<StopBits>,
    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
    /// Do not ask for confirmation before writing
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the serial ports on this host
    Ports,
    /// Find the baud rate the module is configured for
    Detect,
    /// Read MAC address, PAN ID, JV, baud rate, CE and AP
    Read,
    /// Write the PAN ID (hexadecimal, up to FFFFFFFF)
    SetPanId { pan_id: PanId },
    /// Write channel verification (0 or 1)
    SetJv { value: ChannelVerification },
    /// Write the module's interface baud rate
    SetBaud { rate: BaudRate },
    /// Write coordinator enable (0 or 1)
    SetCe { value: CoordinatorEnable },
    /// Write API enable (0 = transparent, 1 = API)
    SetAp { value: ApiMode },
    /// Write every parameter in one session
    WriteAll {
        #[arg(long)]
        pan_id: PanId,
        #[arg(long)]
        jv: ChannelVerification,
        /// New interface baud rate of the module
        #[arg(long)]
        rate: BaudRate,
        #[arg(long)]
        ce: CoordinatorEnable,
        #[arg(long)]
        ap: ApiMode,
    },
}

impl Cli {
    /// Resolves the effective configuration.
    ///
    /// # Details
    /// File values are overridden by the environment, which is overridden by
    /// command-line flags.
    pub fn resolve_config(&self) -> AppConfig {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_PATH));
        let mut config = load_app_config(&path);
        config.apply_env(|key| env::var(key).ok());
        self.apply_flags(&mut config);
        config
    }

    fn apply_flags(&self, config: &mut AppConfig) {
        if let Some(port) = &self.port {
            config.serial_port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if let Some(data_bits) = self.data_bits {
            config.data_bits = data_bits;
        }
        if let Some(parity) = self.parity {
            config.parity = parity;
        }
        if let Some(stop_bits) = self.stop_bits {
            config.stop_bits = stop_bits;
        }
    }
}

/// Runs the parsed command line.
///
/// # Errors
/// Returns an error when the port cannot be opened, the module does not
/// answer, or a write is rejected.
pub fn run(cli: Cli) -> Result<()> {
    let config = cli.resolve_config();
    log::debug!("Effective configuration: {:?}", config);
    let runner = Runner {
        config,
        json: cli.json,
        assume_yes: cli.yes,
    };
    match cli.command {
        Command::Ports => runner.ports(),
        Command::Detect => runner.detect(),
        Command::Read => runner.read(),
        Command::SetPanId { pan_id } => runner.write_one(Parameter::PanId(pan_id)),
        Command::SetJv { value } => runner.write_one(Parameter::ChannelVerification(value)),
        Command::SetBaud { rate } => runner.write_one(Parameter::BaudRate(rate)),
        Command::SetCe { value } => runner.write_one(Parameter::CoordinatorEnable(value)),
        Command::SetAp { value } => runner.write_one(Parameter::ApiMode(value)),
        Command::WriteAll {
            pan_id,
            jv,
            rate,
            ce,
            ap,
        } => runner.write_all(Settings {
            pan_id,
            channel_verification: jv,
            baud_rate: rate,
            coordinator_enable: ce,
            api_mode: ap,
        }),
    }
}

/// Result of `detect`, printed as text or JSON.
#[derive(Serialize)]
struct Detection<'a> {
    port: &'a str,
    baud_rate: BaudRate,
}

struct Runner {
    config: AppConfig,
    json: bool,
    assume_yes: bool,
}

impl Runner {
    fn session(&self) -> Result<AtSession<Box<dyn SerialPort>>> {
        let port = link::open(&self.config.serial_settings())?;
        Ok(AtSession::new(port, Pacing::default()).with_retries(self.config.command_mode_retries))
    }

    fn ports(&self) -> Result<()> {
        let ports = link::list_ports()?;
        if self.json {
            return print_json(&ports);
        }
        print!("{}", format_ports(&ports));
        Ok(())
    }

    fn detect(&self) -> Result<()> {
        let mut session = self.session()?;
        let rate = device::detect_baud_rate(&mut session)
            .with_context(|| format!("Baud rate detection on {} failed", self.config.serial_port))?;
        let detection = Detection {
            port: &self.config.serial_port,
            baud_rate: rate,
        };
        if self.json {
            return print_json(&detection);
        }
        println!(
            "Detected XBee on {} at {} baud. Connect with --baud {}.",
            detection.port, rate, rate
        );
        Ok(())
    }

    fn read(&self) -> Result<()> {
        let mut session = self.session()?;
        let readings = device::read_parameters(&mut session).context("Failed to read parameters")?;
        self.print_readings(&readings)
    }

    fn write_one(&self, parameter: Parameter) -> Result<()> {
        let mut question = format!("Write {}?", parameter);
        if matches!(parameter, Parameter::BaudRate(_)) {
            question.push_str(" You will have to reconnect at the new baud rate.");
        }
        if !self.confirm(&question)? {
            println!("Cancelled.");
            return Ok(());
        }
        let mut session = self.session()?;
        let outcome = device::write_parameter(&mut session, parameter)
            .with_context(|| format!("Failed to write {}", parameter.register()))?;
        self.finish_write(&mut session, &outcome)
    }

    fn write_all(&self, settings: Settings) -> Result<()> {
        let mut question = String::from("Write all of the following parameters?\n");
        for parameter in settings.parameters() {
            question.push_str(&format!("  - {}\n", parameter));
        }
        question.push_str("If the baud rate changes you will have to reconnect.");
        if !self.confirm(&question)? {
            println!("Cancelled.");
            return Ok(());
        }
        let mut session = self.session()?;
        let outcome =
            device::write_all(&mut session, &settings).context("Failed to write all parameters")?;
        self.finish_write(&mut session, &outcome)
    }

    /// Reports a write and re-reads the module when the link still works.
    fn finish_write(
        &self,
        session: &mut AtSession<Box<dyn SerialPort>>,
        outcome: &WriteOutcome,
    ) -> Result<()> {
        log::info!("{}", outcome.message);
        if self.json {
            print_json(outcome)?;
        } else {
            println!("{}", outcome.message);
        }
        if let (true, Some(rate)) = (outcome.baud_rate_changed, outcome.new_baud_rate) {
            if !self.json {
                println!(
                    "The module now uses {} baud; reconnect with --baud {}.",
                    rate, rate
                );
            }
            return Ok(());
        }
        std::thread::sleep(REREAD_DELAY);
        let readings = device::read_parameters(session).context("Failed to read parameters back")?;
        self.print_readings(&readings)
    }

    fn print_readings(&self, readings: &Readings) -> Result<()> {
        if self.json {
            return print_json(readings);
        }
        println!("{}", readings);
        Ok(())
    }

    /// Asks before a write. The prompt goes to stderr; stdout carries only
    /// results.
    fn confirm(&self, question: &str) -> Result<bool> {
        let stdin = io::stdin();
        self.confirm_on(&mut stdin.lock(), &mut io::stderr(), question)
    }

    fn confirm_on<R: BufRead, W: Write>(
        &self,
        input: &mut R,
        prompt: &mut W,
        question: &str,
    ) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        confirm_with(input, prompt, question)
    }
}

/// Asks a yes/no question, defaulting to no.
fn confirm_with<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<bool> {
    write!(output, "{} [y/N] ", question)?;
    output.flush()?;
    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(is_affirmative(&answer))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn format_ports(ports: &[PortEntry]) -> String {
    if ports.is_empty() {
        return "No serial ports found\n".to_string();
    }
    let mut listing = format!("Found {} serial port(s):\n", ports.len());
    for port in ports {
        listing.push_str(&format!("  {} - {}\n", port.device, port.description));
    }
    listing
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}
