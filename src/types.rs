//! Type definitions for serial line parameters and port state.
//!
//! These types model the configuration options shared by every supported
//! bridge chip: baud rates, character framing, control lines, and the
//! connection lifecycle reported to listeners.

use std::fmt;

use crate::error::Error;

/// Supported USB-to-serial bridge chipsets.
///
/// The chipset is resolved from the device identity when a port is
/// selected and stays fixed while a connection is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Chipset {
    /// No driver matches the device.
    #[default]
    None,
    /// Silicon Labs CP210x.
    Cp21xx,
    /// Prolific PL2303 and compatibles.
    Prolific,
    /// FTDI FT232 family.
    Ftdi,
    /// WCH CH340/CH341.
    Ch34x,
}

impl fmt::Display for Chipset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Cp21xx => "CP21xx",
            Self::Prolific => "Prolific",
            Self::Ftdi => "FTDI",
            Self::Ch34x => "CH34x",
        };
        f.write_str(name)
    }
}

/// Standard baud rates understood by the drivers.
///
/// Each chipset maps a subset of these to its own register values; a rate
/// a chipset cannot produce is rejected when the port is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum BaudRate {
    /// 300 baud.
    Baud300,
    /// 600 baud.
    Baud600,
    /// 1200 baud.
    Baud1200,
    /// 2400 baud.
    Baud2400,
    /// 4800 baud.
    Baud4800,
    /// 9600 baud.
    #[default]
    Baud9600,
    /// 14400 baud.
    Baud14400,
    /// 19200 baud.
    Baud19200,
    /// 38400 baud.
    Baud38400,
    /// 57600 baud.
    Baud57600,
    /// 115200 baud.
    Baud115200,
    /// 230400 baud.
    Baud230400,
    /// 460800 baud.
    Baud460800,
    /// 921600 baud.
    Baud921600,
}

impl BaudRate {
    /// Every rate, in ascending order.
    pub const ALL: [BaudRate; 14] = [
        Self::Baud300,
        Self::Baud600,
        Self::Baud1200,
        Self::Baud2400,
        Self::Baud4800,
        Self::Baud9600,
        Self::Baud14400,
        Self::Baud19200,
        Self::Baud38400,
        Self::Baud57600,
        Self::Baud115200,
        Self::Baud230400,
        Self::Baud460800,
        Self::Baud921600,
    ];

    /// The rate in bits per second.
    pub fn value(self) -> u32 {
        match self {
            Self::Baud300 => 300,
            Self::Baud600 => 600,
            Self::Baud1200 => 1200,
            Self::Baud2400 => 2400,
            Self::Baud4800 => 4800,
            Self::Baud9600 => 9600,
            Self::Baud14400 => 14400,
            Self::Baud19200 => 19200,
            Self::Baud38400 => 38400,
            Self::Baud57600 => 57600,
            Self::Baud115200 => 115_200,
            Self::Baud230400 => 230_400,
            Self::Baud460800 => 460_800,
            Self::Baud921600 => 921_600,
        }
    }

    /// Look up the enumeration entry for a numeric rate.
    pub fn from_value(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.value() == value)
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or(Error::InvalidArgument("not a standard baud rate"))
    }
}

/// Parity mode for serial communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
    /// Mark parity (always 1).
    Mark,
    /// Space parity (always 0).
    Space,
}

impl Parity {
    /// Position in declaration order. Used by the settings text and by
    /// chipsets whose wire encoding follows the same order.
    pub fn ordinal(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Odd => 1,
            Self::Even => 2,
            Self::Mark => 3,
            Self::Space => 4,
        }
    }

    /// Inverse of [`ordinal`](Self::ordinal).
    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Odd),
            2 => Some(Self::Even),
            3 => Some(Self::Mark),
            4 => Some(Self::Space),
            _ => None,
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Number of stop bits for serial communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StopBits {
    /// 1 stop bit.
    #[default]
    One,
    /// 1.5 stop bits.
    OnePointFive,
    /// 2 stop bits.
    Two,
}

impl StopBits {
    /// Position in declaration order (`One` = 0, `OnePointFive` = 1, `Two` = 2).
    pub fn ordinal(self) -> u8 {
        match self {
            Self::One => 0,
            Self::OnePointFive => 1,
            Self::Two => 2,
        }
    }

    /// Inverse of [`ordinal`](Self::ordinal).
    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::One),
            1 => Some(Self::OnePointFive),
            2 => Some(Self::Two),
            _ => None,
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataBits {
    /// 5 data bits.
    Five,
    /// 6 data bits.
    Six,
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    #[default]
    Eight,
}

impl DataBits {
    /// Number of bits.
    pub fn value(self) -> u8 {
        match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            _ => Err(Error::InvalidArgument("data bits must be between 5 and 8")),
        }
    }
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Modem control output lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineSignal {
    /// Data Terminal Ready.
    Dtr,
    /// Request To Send.
    Rts,
}

/// Connection lifecycle states reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MediaState {
    /// No connection.
    #[default]
    Closed,
    /// `open()` is programming the chipset.
    Opening,
    /// Connected and receiving.
    Open,
    /// `close()` is tearing the connection down.
    Closing,
}

/// Verbosity of trace events.
///
/// Levels are ordered: a port at `Info` also emits `Warning` and `Error`
/// traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum TraceLevel {
    /// No trace events.
    #[default]
    Off,
    /// Errors only.
    Error,
    /// Errors and warnings.
    Warning,
    /// Informational messages such as state changes.
    Info,
    /// Everything, including sent and received bytes.
    Verbose,
}
