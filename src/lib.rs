/*
 * @file lib.rs
 * @brief xbee-config library root
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

//! XBee Configurator - read and write Digi XBee parameters over a serial port.
//!
//! The module is driven in AT command mode:
//! - the `+++` escape switches it into command mode,
//! - `AT<cmd>\r` lines read or write registers (ID, JV, BD, CE, AP, SH, SL),
//! - `ATWR`, `ATAC` and `ATCN` save, apply and leave.
//!
//! # Example
//! ```no_run
//! use anyhow::Result;
//! use xbee_config::at::{AtSession, Pacing};
//! use xbee_config::link::{self, DataBits, Parity, SerialSettings, StopBits};
//! use xbee_config::device;
//!
//! fn main() -> Result<()> {
//!     let port = link::open(&SerialSettings {
//!         path: "/dev/ttyUSB0".to_string(),
//!         baud: 9600,
//!         data_bits: DataBits::Eight,
//!         parity: Parity::None,
//!         stop_bits: StopBits::One,
//!     })?;
//!     let mut session = AtSession::new(port, Pacing::default());
//!     let readings = device::read_parameters(&mut session)?;
//!     println!("{}", readings);
//!     Ok(())
//! }
//! ```

pub mod at;
pub mod cli;
pub mod config;
pub mod device;
pub mod link;
pub mod params;

#[cfg(test)]
mod sim;
