use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Serial port related errors.
pub mod error;

/// The serial port structure.
#[cfg(unix)]
pub mod serial_port;

/// Codecs for encoding/decoding messages to/from wire.
pub mod codecs;

use error::SerialPortError;

/// How long a read may wait for data before returning with nothing.
pub const READ_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(100);

/// Supported line speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BaudRate {
    /// 9600 baud.
    #[default]
    B9600,
    /// 115200 baud.
    B115200,
}

impl BaudRate {
    /// The speed closest to what was asked for.
    ///
    /// Anything unsupported becomes 9600 rather than an error.
    pub fn from_requested(baud: u32) -> Self {
        match baud {
            9600 => Self::B9600,
            115_200 => Self::B115200,
            other => {
                warn!(requested = other, "Unsupported baud rate, using 9600");
                Self::B9600
            }
        }
    }

    /// Symbols per second.
    pub const fn as_u32(self) -> u32 {
        match self {
            BaudRate::B9600 => 9600,
            BaudRate::B115200 => 115_200,
        }
    }
}

impl Display for BaudRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// Bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DataBits {
    /// Five.
    Five,
    /// Six.
    Six,
    /// Seven.
    Seven,
    /// Eight.
    #[default]
    Eight,
}

impl DataBits {
    /// Anything outside `5..=8` becomes eight.
    pub fn from_requested(bits: u8) -> Self {
        match bits {
            5 => Self::Five,
            6 => Self::Six,
            7 => Self::Seven,
            8 => Self::Eight,
            other => {
                warn!(requested = other, "Unsupported data bits, using 8");
                Self::Eight
            }
        }
    }

    /// The number of bits.
    pub const fn as_u8(self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Parity checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

impl Parity {
    /// `e` is even, `o` is odd, anything else means no parity.
    pub fn from_requested(c: char) -> Self {
        match c.to_ascii_lowercase() {
            'e' => Self::Even,
            'o' => Self::Odd,
            _ => Self::None,
        }
    }
}

impl Display for Parity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Parity::None => "none",
            Parity::Even => "even",
            Parity::Odd => "odd",
        };

        write!(f, "{s}")
    }
}

/// Stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StopBits {
    /// One.
    #[default]
    One,
    /// Two.
    Two,
}

impl StopBits {
    /// Two means two, anything else means one.
    pub fn from_requested(bits: u8) -> Self {
        if bits == 2 {
            Self::Two
        } else {
            Self::One
        }
    }

    /// The number of bits.
    pub const fn as_u8(self) -> u8 {
        match self {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

/// Everything that describes how characters travel on the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct LineSettings {
    /// Line speed.
    pub baud: BaudRate,

    /// Bits per character.
    pub data_bits: DataBits,

    /// Parity.
    pub parity: Parity,

    /// Stop bits.
    pub stop_bits: StopBits,
}

impl LineSettings {
    /// 8N1 at the given speed.
    pub fn new(baud: BaudRate) -> Self {
        Self {
            baud,
            ..Default::default()
        }
    }
}

impl Display for LineSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };

        write!(
            f,
            "{} {}{}{}",
            self.baud,
            self.data_bits.as_u8(),
            parity,
            self.stop_bits.as_u8()
        )
    }
}

/// An open line that bytes can be read from and written to.
///
/// Reads and writes take `&self`: the receiving and sending activities share one port
/// without a lock, the operating system serializes access to the device.
pub trait Port: Send + Sync + 'static {
    /// Where the port lives, for logs and display.
    fn name(&self) -> &str;

    /// Read whatever is available, waiting at most [`READ_TIMEOUT`].
    ///
    /// Having nothing to read is `Ok(0)`, not an error.
    fn read(&self, buf: &mut [u8]) -> Result<usize, SerialPortError>;

    /// Write the bytes in one call.
    /// Returns how many were accepted, which may be fewer than asked.
    fn write(&self, bytes: &[u8]) -> Result<usize, SerialPortError>;

    /// The settings currently committed on the line.
    fn settings(&self) -> Result<LineSettings, SerialPortError>;

    /// Apply all of `settings` in a single commit.
    fn reconfigure(&self, settings: &LineSettings) -> Result<(), SerialPortError>;

    /// Release the port.
    fn close(self) -> Result<(), SerialPortError>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn unsupported_values_fall_back() {
        assert_eq!(BaudRate::from_requested(115_200), BaudRate::B115200);
        assert_eq!(BaudRate::from_requested(57_600), BaudRate::B9600);
        assert_eq!(BaudRate::from_requested(0), BaudRate::B9600);

        assert_eq!(DataBits::from_requested(5), DataBits::Five);
        assert_eq!(DataBits::from_requested(9), DataBits::Eight);

        assert_eq!(Parity::from_requested('E'), Parity::Even);
        assert_eq!(Parity::from_requested('o'), Parity::Odd);
        assert_eq!(Parity::from_requested('x'), Parity::None);

        assert_eq!(StopBits::from_requested(2), StopBits::Two);
        assert_eq!(StopBits::from_requested(3), StopBits::One);
    }

    #[test]
    fn display() {
        let settings = LineSettings {
            baud: BaudRate::B115200,
            data_bits: DataBits::Seven,
            parity: Parity::Even,
            stop_bits: StopBits::Two,
        };

        assert_eq!(settings.to_string(), "115200 7E2");
        assert_eq!(LineSettings::default().to_string(), "9600 8N1");
    }
}
