//! In-memory XBee module speaking AT command mode, used by the unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;

use crate::link::Link;
use crate::params::BaudRate;

/// Registers the module refuses to change.
const READ_ONLY: [&str; 2] = ["SH", "SL"];

/// Simulated module attached to a simulated serial line.
///
/// # Details
/// `+++` only gets an `OK` when the line speed matches the module's
/// configured rate. A BD write takes effect on `AC`, after which the old line
/// speed stops working, as on real hardware.
pub(crate) struct SimulatedXBee {
    registers: HashMap<String, String>,
    frozen: HashSet<String>,
    broken_rates: HashSet<u32>,
    raw_replies: HashMap<String, Vec<u8>>,
    failing_exit: bool,
    device_baud: u32,
    line_baud: u32,
    command_mode: bool,
    mute_escape: usize,
    rx: VecDeque<u8>,
    partial: Vec<u8>,
    /// Every line the host sent, without the trailing carriage return.
    pub sent: Vec<String>,
    pub saved: bool,
    pub applied: bool,
}

impl SimulatedXBee {
    pub fn new() -> Self {
        let registers = [
            ("ID", "3332"),
            ("JV", "1"),
            ("BD", "3"),
            ("CE", "0"),
            ("AP", "0"),
            ("SH", "13A200"),
            ("SL", "41B7C2D1"),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
        Self {
            registers,
            frozen: HashSet::new(),
            broken_rates: HashSet::new(),
            raw_replies: HashMap::new(),
            failing_exit: false,
            device_baud: 9_600,
            line_baud: 9_600,
            command_mode: false,
            mute_escape: 0,
            rx: VecDeque::new(),
            partial: Vec::new(),
            sent: Vec::new(),
            saved: false,
            applied: false,
        }
    }

    /// Configures the module for `rate` while the host line stays at 9600.
    pub fn with_device_baud(mut self, rate: BaudRate) -> Self {
        self.device_baud = rate.bps();
        self.registers
            .insert("BD".to_string(), rate.index().to_string());
        self
    }

    pub fn with_register(mut self, name: &str, value: &str) -> Self {
        self.registers.insert(name.to_string(), value.to_string());
        self
    }

    /// Removes a register so that queries and writes answer `ERROR`.
    pub fn without_register(mut self, name: &str) -> Self {
        self.registers.remove(name);
        self
    }

    /// Accepts writes to `name` with `OK` but keeps the old value.
    pub fn with_frozen(mut self, name: &str) -> Self {
        self.frozen.insert(name.to_string());
        self
    }

    /// Makes switching the line to `bps` fail with an I/O error.
    pub fn with_broken_rate(mut self, bps: u32) -> Self {
        self.broken_rates.insert(bps);
        self
    }

    /// Answers queries of `name` with exactly `bytes`, valid UTF-8 or not.
    pub fn with_raw_reply(mut self, name: &str, bytes: &[u8]) -> Self {
        self.raw_replies.insert(name.to_string(), bytes.to_vec());
        self
    }

    /// Makes sending `ATCN` fail with an I/O error.
    pub fn with_failing_exit(mut self) -> Self {
        self.failing_exit = true;
        self
    }

    /// Ignores the next `count` escape sequences.
    pub fn with_muted_escapes(mut self, count: usize) -> Self {
        self.mute_escape = count;
        self
    }

    pub fn register(&self, name: &str) -> Option<&str> {
        self.registers.get(name).map(String::as_str)
    }

    pub fn device_baud(&self) -> u32 {
        self.device_baud
    }

    fn reply(&mut self, text: &str) {
        self.rx.extend(text.as_bytes());
        self.rx.push_back(b'\r');
    }

    fn handle_escape(&mut self) {
        self.sent.push("+++".to_string());
        if self.line_baud != self.device_baud {
            return;
        }
        if self.mute_escape > 0 {
            self.mute_escape -= 1;
            return;
        }
        self.command_mode = true;
        self.reply("OK");
    }

    fn handle_line(&mut self, line: &str) {
        self.sent.push(line.to_string());
        if self.line_baud != self.device_baud || !self.command_mode {
            return;
        }
        let Some(body) = line.strip_prefix("AT") else {
            self.reply("ERROR");
            return;
        };
        if body.len() < 2 {
            self.reply("ERROR");
            return;
        }
        let (name, argument) = body.split_at(2);
        match name {
            "CN" => {
                self.command_mode = false;
                self.reply("OK");
            }
            "WR" => {
                self.saved = true;
                self.reply("OK");
            }
            "AC" => {
                self.applied = true;
                let pending = self
                    .registers
                    .get("BD")
                    .and_then(|value| u8::from_str_radix(value, 16).ok())
                    .and_then(BaudRate::from_index);
                self.reply("OK");
                if let Some(rate) = pending {
                    self.device_baud = rate.bps();
                }
            }
            _ if argument.is_empty() && self.raw_replies.contains_key(name) => {
                let raw = self.raw_replies[name].clone();
                self.rx.extend(raw);
                self.rx.push_back(b'\r');
            }
            _ if argument.is_empty() => match self.registers.get(name).cloned() {
                Some(value) => self.reply(&value),
                None => self.reply("ERROR"),
            },
            _ => self.write_register(name, argument),
        }
    }

    fn write_register(&mut self, name: &str, argument: &str) {
        if !self.registers.contains_key(name) || READ_ONLY.contains(&name) {
            self.reply("ERROR");
            return;
        }
        let Ok(value) = u32::from_str_radix(argument, 16) else {
            self.reply("ERROR");
            return;
        };
        let valid_rate = u8::try_from(value)
            .ok()
            .and_then(BaudRate::from_index)
            .is_some();
        if name == "BD" && !valid_rate {
            self.reply("ERROR");
            return;
        }
        if !self.frozen.contains(name) {
            self.registers.insert(name.to_string(), format!("{:X}", value));
        }
        self.reply("OK");
    }
}

impl Link for SimulatedXBee {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes == b"+++" {
            self.handle_escape();
            return Ok(());
        }
        if self.failing_exit && bytes == b"ATCN\r" {
            return Err(io::Error::new(io::ErrorKind::Other, "line dropped on ATCN"));
        }
        for &byte in bytes {
            if byte == b'\r' {
                let line = String::from_utf8_lossy(&self.partial).into_owned();
                self.partial.clear();
                self.handle_line(&line);
            } else {
                self.partial.push(byte);
            }
        }
        Ok(())
    }

    fn pending(&mut self) -> io::Result<usize> {
        Ok(self.rx.len())
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn set_baud_rate(&mut self, baud: u32) -> io::Result<()> {
        if self.broken_rates.contains(&baud) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("cannot switch line to {} baud", baud),
            ));
        }
        self.line_baud = baud;
        Ok(())
    }

    fn clear_buffers(&mut self) -> io::Result<()> {
        self.rx.clear();
        self.partial.clear();
        Ok(())
    }
}
