//! Line discipline parameters
//!
//! [`Attributes`] is the full snapshot of a port's framing, parity and flow
//! control settings. The single-value types validate their inputs so a bad
//! value never reaches a device driver.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Baud rates accepted by [`Attributes::speed`]
pub const SUPPORTED_SPEEDS: &[u32] = &[
    50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, // Legacy
    9600,   // Default
    19200, 38400, 57600, //
    115200, // Common for modern boards
    230400, 460800, 500000, 576000, 921600, // High speed
    1000000, 1152000, 1500000, 2000000, 2500000, 3000000, 3500000, 4000000,
];

/// Default speed applied on open
pub const DEFAULT_SPEED: u32 = 9600;

/// Check that `speed` is one of [`SUPPORTED_SPEEDS`]
pub fn validate_speed(speed: u32) -> Result<u32> {
    if SUPPORTED_SPEEDS.contains(&speed) {
        Ok(speed)
    } else {
        Err(Error::invalid("speed", speed))
    }
}

/// Parity mode. Config files may spell it out or use the `N`/`E`/`O` letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parity::None => write!(f, "none"),
            Parity::Even => write!(f, "even"),
            Parity::Odd => write!(f, "odd"),
        }
    }
}

impl std::str::FromStr for Parity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" | "n" => Ok(Parity::None),
            "even" | "e" => Ok(Parity::Even),
            "odd" | "o" => Ok(Parity::Odd),
            _ => Err(Error::invalid("parity", s)),
        }
    }
}

impl TryFrom<String> for Parity {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Parity> for String {
    fn from(parity: Parity) -> String {
        parity.to_string()
    }
}

/// Number of stop bits. Only 1 and 2 exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = Error;

    fn try_from(n: u8) -> Result<Self> {
        match n {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            _ => Err(Error::invalid("stop bits", n)),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(stop: StopBits) -> u8 {
        match stop {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

/// Frame size in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = Error;

    fn try_from(n: u8) -> Result<Self> {
        match n {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            _ => Err(Error::invalid("data bits", n)),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> u8 {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Complete line discipline snapshot, as read by
/// [`SerialSession::attributes`](crate::SerialSession::attributes) and
/// reapplied by [`SerialSession::set_attributes`](crate::SerialSession::set_attributes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    /// Baud rate (default: 9600)
    pub speed: u32,
    /// Data bits (default: 8)
    pub data_bits: DataBits,
    /// Parity (default: none)
    pub parity: Parity,
    /// Stop bits (default: 1)
    pub stop_bits: StopBits,
    /// RTS/CTS flow control
    pub hw_flow_control: bool,
    /// XON/XOFF flow control
    pub sw_flow_control: bool,
    /// Ignore modem control lines
    pub local: bool,
    /// Drop DTR/RTS when the device is closed
    pub hangup: bool,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            hw_flow_control: false,
            sw_flow_control: false,
            local: true,
            hangup: true,
        }
    }
}

impl Attributes {
    /// Check the fields that the type system cannot
    pub fn validate(&self) -> Result<()> {
        validate_speed(self.speed)?;
        Ok(())
    }
}

impl fmt::Display for Attributes {
    /// Conventional `9600 8N1` notation
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };
        write!(
            f,
            "{} {}{}{}",
            self.speed,
            u8::from(self.data_bits),
            parity,
            u8::from(self.stop_bits)
        )
    }
}

/// Which buffered data [`SerialSession::flush`](crate::SerialSession::flush) discards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushQueue {
    /// Received but unread data
    Input,
    /// Written but untransmitted data
    Output,
    Both,
}

/// Buffer direction for occupancy queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Modem control line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemSignal {
    /// Data Terminal Ready (output)
    Dtr,
    /// Request To Send (output)
    Rts,
    /// Clear To Send (input)
    Cts,
    /// Data Set Ready (input)
    Dsr,
    /// Data Carrier Detect (input)
    Dcd,
    /// Ring Indicator (input)
    Ri,
}

impl ModemSignal {
    /// Whether the local side drives this line
    pub fn is_output(self) -> bool {
        matches!(self, ModemSignal::Dtr | ModemSignal::Rts)
    }
}

impl fmt::Display for ModemSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModemSignal::Dtr => write!(f, "DTR"),
            ModemSignal::Rts => write!(f, "RTS"),
            ModemSignal::Cts => write!(f, "CTS"),
            ModemSignal::Dsr => write!(f, "DSR"),
            ModemSignal::Dcd => write!(f, "DCD"),
            ModemSignal::Ri => write!(f, "RI"),
        }
    }
}

/// Levels of every modem control line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModemBits {
    pub dtr: bool,
    pub rts: bool,
    pub cts: bool,
    pub dsr: bool,
    pub dcd: bool,
    pub ri: bool,
}

impl ModemBits {
    /// Level of a single line
    pub fn get(&self, signal: ModemSignal) -> bool {
        match signal {
            ModemSignal::Dtr => self.dtr,
            ModemSignal::Rts => self.rts,
            ModemSignal::Cts => self.cts,
            ModemSignal::Dsr => self.dsr,
            ModemSignal::Dcd => self.dcd,
            ModemSignal::Ri => self.ri,
        }
    }

    /// Set the level of a single line
    pub fn set(&mut self, signal: ModemSignal, level: bool) {
        match signal {
            ModemSignal::Dtr => self.dtr = level,
            ModemSignal::Rts => self.rts = level,
            ModemSignal::Cts => self.cts = level,
            ModemSignal::Dsr => self.dsr = level,
            ModemSignal::Dcd => self.dcd = level,
            ModemSignal::Ri => self.ri = level,
        }
    }
}
