/*
 * @file device.rs
 * @brief Read, write and detection workflows for XBee modules
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

//! Parameter workflows: each function runs one full command-mode session.

use serde::Serialize;

use crate::at::{pause, AtError, AtSession};
use crate::link::Link;
use crate::params::{
    clean_reply, join_mac_address, parse_pan_id_reply, parse_register, parse_small_register,
    BaudRate, Parameter, Readings, Settings,
};

/// Rate assumed when the module's BD reply cannot be parsed.
const FALLBACK_BAUD: BaudRate = BaudRate::B9600;

/// Result of a successful write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub message: String,
    /// `true` when the module now talks at a different rate; the caller must
    /// reconnect at [`WriteOutcome::new_baud_rate`].
    pub baud_rate_changed: bool,
    pub new_baud_rate: Option<BaudRate>,
}

/// Runs `body` inside command mode and always tries to leave it afterwards.
///
/// # Details
/// When `body` fails, `ATCN` is still sent so the module does not linger in
/// command mode; a failure of that exit is logged and the original error is
/// returned.
fn in_command_mode<L, T, F>(session: &mut AtSession<L>, body: F) -> Result<T, AtError>
where
    L: Link,
    F: FnOnce(&mut AtSession<L>) -> Result<T, AtError>,
{
    session.enter_command_mode()?;
    match body(session) {
        Ok(value) => {
            session.exit_command_mode()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(exit_err) = session.exit_command_mode() {
                log::warn!("Failed to leave command mode after error: {}", exit_err);
            }
            Err(err)
        }
    }
}

/// Reads every parameter the tool manages.
///
/// # Details
/// Queries JV, BD, ID, CE, AP, SH and SL in that order. A register whose
/// reply does not parse is left empty in the result.
///
/// # Arguments
/// * `session` - Session on a connected link.
///
/// # Returns
/// * `Ok(Readings)` - Values reported by the module.
///
/// # Errors
/// Returns an error if command mode cannot be entered or the link fails.
pub fn read_parameters<L: Link>(session: &mut AtSession<L>) -> Result<Readings, AtError> {
    in_command_mode(session, |at| {
        let step = at.pacing().step_pause;
        let mut readings = Readings::default();

        log::info!("Reading JV...");
        readings.channel_verification = parse_small_register(&at.query("JV")?);
        pause(step);

        log::info!("Reading baud rate...");
        readings.baud_rate_index = parse_small_register(&at.query("BD")?);
        readings.baud_rate = readings.baud_rate_index.and_then(BaudRate::from_index);
        pause(step);

        log::info!("Reading PAN ID...");
        let id_reply = at.query("ID")?;
        readings.pan_id = parse_pan_id_reply(&id_reply);
        readings.pan_id_raw = clean_reply(&id_reply).to_uppercase();
        pause(step);

        log::info!("Reading CE (coordinator enable)...");
        readings.coordinator_enable = parse_small_register(&at.query("CE")?);
        pause(step);

        log::info!("Reading AP (API enable)...");
        readings.api_mode = parse_small_register(&at.query("AP")?);
        pause(step);

        log::info!("Reading MAC address...");
        let high = at.query("SH")?;
        pause(step);
        let low = at.query("SL")?;
        readings.mac_address = join_mac_address(&high, &low);

        Ok(readings)
    })
}

/// Writes one register, verifies it, saves and applies.
///
/// # Details
/// The register is read back after the write; a different value aborts the
/// session before `ATWR` so nothing unverified is saved.
///
/// # Arguments
/// * `session` - Session on a connected link.
/// * `parameter` - Register and value to store.
///
/// # Returns
/// * `Ok(WriteOutcome)` - The write was saved and applied.
///
/// # Errors
/// Returns [`AtError::Rejected`] or [`AtError::VerifyMismatch`] when the
/// module does not take the value, or any link error.
pub fn write_parameter<L: Link>(
    session: &mut AtSession<L>,
    parameter: Parameter,
) -> Result<WriteOutcome, AtError> {
    in_command_mode(session, |at| {
        let original_baud = match parameter {
            Parameter::BaudRate(_) => Some(current_baud(at)?),
            _ => None,
        };

        log::info!("Writing {}...", parameter);
        at.set(parameter.register(), &parameter.argument())?;
        pause(at.pacing().write_settle);

        log::info!("Verifying {}...", parameter.register());
        verify(at, &parameter)?;

        at.write_settings()?;
        pause(at.pacing().write_settle);
        at.apply_changes()?;

        let outcome = match (parameter, original_baud) {
            (Parameter::BaudRate(rate), Some(original)) => WriteOutcome {
                message: format!("Baud Rate updated to {}", rate),
                baud_rate_changed: rate != original,
                new_baud_rate: Some(rate),
            },
            _ => WriteOutcome {
                message: format!("{} written", parameter),
                baud_rate_changed: false,
                new_baud_rate: None,
            },
        };
        Ok(outcome)
    })
}

/// Writes the full register set in one session.
///
/// # Details
/// Learns the current rate first, then writes ID, JV, CE, AP and finally
/// BD, because a new rate can cut the link once applied. Values are not read
/// back individually; callers re-read afterwards when the rate is unchanged.
///
/// # Errors
/// Returns an error if any write is rejected or the link fails.
pub fn write_all<L: Link>(
    session: &mut AtSession<L>,
    settings: &Settings,
) -> Result<WriteOutcome, AtError> {
    in_command_mode(session, |at| {
        let step = at.pacing().step_pause;
        log::info!("Reading original baud rate...");
        let original_baud = current_baud(at)?;
        pause(step);

        let parameters = settings.parameters();
        let total = parameters.len();
        for (position, parameter) in parameters.iter().enumerate() {
            log::info!("[{}/{}] Writing {}...", position + 1, total, parameter);
            at.set(parameter.register(), &parameter.argument())?;
            pause(step);
        }

        at.write_settings()?;
        pause(at.pacing().write_settle);
        at.apply_changes()?;
        pause(step);

        Ok(WriteOutcome {
            message: "All parameters written".to_string(),
            baud_rate_changed: settings.baud_rate != original_baud,
            new_baud_rate: Some(settings.baud_rate),
        })
    })
}

/// Finds the rate the module's serial interface is configured for.
///
/// # Details
/// Switches the link through [`BaudRate::DETECTION_ORDER`] and tries the
/// escape sequence once per rate. The first rate that answers `OK` wins and
/// command mode is left again. An I/O failure on one rate is logged and the
/// search continues.
///
/// # Errors
/// Returns [`AtError::NotDetected`] when no rate answers.
pub fn detect_baud_rate<L: Link>(session: &mut AtSession<L>) -> Result<BaudRate, AtError> {
    for rate in BaudRate::DETECTION_ORDER {
        log::info!("Trying {} baud...", rate);
        match probe(session, rate) {
            Ok(true) => {
                log::info!("Detected XBee at {} baud", rate);
                if let Err(err) = session.exit_command_mode() {
                    log::warn!("Failed to leave command mode after detection: {}", err);
                }
                return Ok(rate);
            }
            Ok(false) => {}
            Err(err) => log::warn!("Probe at {} baud failed: {}", rate, err),
        }
    }
    Err(AtError::NotDetected)
}

fn probe<L: Link>(session: &mut AtSession<L>, rate: BaudRate) -> Result<bool, AtError> {
    let settle = session.pacing().baud_settle;
    let link = session.link_mut();
    link.set_baud_rate(rate.bps())?;
    pause(settle);
    link.clear_buffers()?;
    let (entered, _) = session.try_enter_command_mode()?;
    Ok(entered)
}

fn current_baud<L: Link>(session: &mut AtSession<L>) -> Result<BaudRate, AtError> {
    let reply = session.query("BD")?;
    Ok(parse_small_register(&reply)
        .and_then(BaudRate::from_index)
        .unwrap_or_else(|| {
            log::warn!("Unreadable BD reply {:?}, assuming {}", reply, FALLBACK_BAUD);
            FALLBACK_BAUD
        }))
}

fn verify<L: Link>(session: &mut AtSession<L>, parameter: &Parameter) -> Result<(), AtError> {
    let reply = session.query(parameter.register())?;
    if parse_register(&reply) == Some(parameter.expected_value()) {
        return Ok(());
    }
    Err(AtError::VerifyMismatch {
        register: parameter.register(),
        expected: parameter.argument(),
        actual: reply,
    })
}
