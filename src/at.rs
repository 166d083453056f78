/*
 * @file at.rs
 * @brief AT command mode session over a serial link
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

//! AT command mode framing.
//!
//! A session enters command mode with the `+++` escape, exchanges
//! `AT<cmd>\r` lines with the module and leaves with `ATCN`.

use std::io;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::link::Link;

/// Escape sequence that switches the module into command mode.
const ESCAPE_SEQUENCE: &[u8] = b"+++";

/// Failures of an AT exchange.
#[derive(Debug, Error)]
pub enum AtError {
    #[error("serial I/O failed")]
    Io(#[from] io::Error),
    #[error("module did not enter AT command mode (reply: {reply:?})")]
    NoCommandMode { reply: String },
    #[error("module rejected {command} (reply: {reply:?})")]
    Rejected { command: String, reply: String },
    #[error("{register} reads back {actual:?} after writing {expected}")]
    VerifyMismatch {
        register: &'static str,
        expected: String,
        actual: String,
    },
    #[error("no XBee module answered at any supported baud rate")]
    NotDetected,
}

/// Delays that frame the AT exchange.
///
/// # Details
/// The module only recognises `+++` when it is surrounded by silence (the GT
/// guard time), and it needs time to answer each command. The defaults are
/// safe for a factory-configured module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacing {
    /// Silence before the escape sequence.
    pub guard_before: Duration,
    /// Silence after the escape sequence before reading the `OK`.
    pub guard_after: Duration,
    /// Wait after sending a command before reading its reply.
    pub reply_wait: Duration,
    /// Interval between polls while draining a reply.
    pub drain_poll: Duration,
    /// Pause after writing a single register.
    pub write_settle: Duration,
    /// Pause between the steps of a read or bulk write.
    pub step_pause: Duration,
    /// Pause after switching the line speed during detection.
    pub baud_settle: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            guard_before: Duration::from_secs(1),
            guard_after: Duration::from_secs(2),
            reply_wait: Duration::from_millis(200),
            drain_poll: Duration::from_millis(20),
            write_settle: Duration::from_millis(500),
            step_pause: Duration::from_millis(300),
            baud_settle: Duration::from_millis(500),
        }
    }
}

impl Pacing {
    /// Pacing with every delay set to zero.
    pub const fn zero() -> Self {
        Self {
            guard_before: Duration::ZERO,
            guard_after: Duration::ZERO,
            reply_wait: Duration::ZERO,
            drain_poll: Duration::ZERO,
            write_settle: Duration::ZERO,
            step_pause: Duration::ZERO,
            baud_settle: Duration::ZERO,
        }
    }
}

/// One conversation with a module over a [`Link`].
pub struct AtSession<L: Link> {
    link: L,
    pacing: Pacing,
    retries: u32,
}

impl<L: Link> AtSession<L> {
    pub fn new(link: L, pacing: Pacing) -> Self {
        Self {
            link,
            pacing,
            retries: 0,
        }
    }

    /// Sets how many extra attempts [`Self::enter_command_mode`] makes.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    /// Switches the module into AT command mode.
    ///
    /// # Details
    /// Sends the guarded `+++` escape and succeeds once the reply contains
    /// `OK`. The escape is repeated up to the configured retry count.
    ///
    /// # Errors
    /// Returns [`AtError::NoCommandMode`] with the last reply when every
    /// attempt goes unanswered, or [`AtError::Io`] if the link fails.
    pub fn enter_command_mode(&mut self) -> Result<(), AtError> {
        log::info!("Entering AT command mode...");
        let mut last_reply = String::new();
        for attempt in 0..=self.retries {
            if attempt > 0 {
                log::warn!("Retrying AT command mode ({}/{})", attempt, self.retries);
            }
            let (entered, reply) = self.try_enter_command_mode()?;
            if entered {
                log::info!("Entered AT command mode");
                return Ok(());
            }
            last_reply = reply;
        }
        Err(AtError::NoCommandMode { reply: last_reply })
    }

    /// Sends one escape and reports whether the module answered `OK`.
    pub(crate) fn try_enter_command_mode(&mut self) -> Result<(bool, String), AtError> {
        pause(self.pacing.guard_before);
        self.link.send(ESCAPE_SEQUENCE)?;
        pause(self.pacing.guard_after);
        let reply = self.drain()?;
        log::debug!("+++ -> {:?}", reply);
        Ok((reply.contains("OK"), reply))
    }

    /// Sends `AT<cmd>\r` and returns the trimmed reply.
    ///
    /// # Details
    /// Waits the reply time, then reads until nothing more is pending.
    /// Invalid UTF-8 in the reply is dropped.
    pub fn command(&mut self, cmd: &str) -> Result<String, AtError> {
        let line = format!("AT{}\r", cmd);
        self.link.send(line.as_bytes())?;
        pause(self.pacing.reply_wait);
        let reply = self.drain()?;
        log::debug!("AT{} -> {:?}", cmd, reply);
        Ok(reply)
    }

    /// Reads a register.
    pub fn query(&mut self, register: &str) -> Result<String, AtError> {
        self.command(register)
    }

    /// Writes a register.
    ///
    /// # Errors
    /// Returns [`AtError::Rejected`] if the module answers `ERROR`.
    pub fn set(&mut self, register: &str, argument: &str) -> Result<String, AtError> {
        self.checked(&format!("{}{}", register, argument))
    }

    /// Saves the current configuration to non-volatile memory (`ATWR`).
    pub fn write_settings(&mut self) -> Result<String, AtError> {
        log::info!("Writing configuration to flash (ATWR)...");
        self.checked("WR")
    }

    /// Applies queued changes (`ATAC`).
    pub fn apply_changes(&mut self) -> Result<String, AtError> {
        log::info!("Applying changes (ATAC)...");
        self.checked("AC")
    }

    /// Leaves command mode (`ATCN`). The reply is only logged.
    pub fn exit_command_mode(&mut self) -> Result<(), AtError> {
        log::info!("Leaving AT command mode...");
        let reply = self.command("CN")?;
        log::debug!("ATCN reply: {:?}", reply);
        Ok(())
    }

    fn checked(&mut self, cmd: &str) -> Result<String, AtError> {
        let reply = self.command(cmd)?;
        if reply.contains("ERROR") {
            return Err(AtError::Rejected {
                command: format!("AT{}", cmd),
                reply,
            });
        }
        Ok(reply)
    }

    fn drain(&mut self) -> Result<String, AtError> {
        let mut received = Vec::new();
        loop {
            let waiting = self.link.pending()?;
            if waiting == 0 {
                break;
            }
            let mut chunk = vec![0_u8; waiting];
            let read = self.link.receive(&mut chunk)?;
            received.extend_from_slice(&chunk[..read]);
            pause(self.pacing.drain_poll);
        }
        Ok(String::from_utf8_lossy(&received)
            .replace(char::REPLACEMENT_CHARACTER, "")
            .trim()
            .to_string())
    }
}

/// Sleeps unless the delay is zero.
pub(crate) fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
