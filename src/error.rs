use std::io;

use thiserror::Error;

use crate::serial::error::SerialPortError;

/// Errors that may occur in this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Opening, configuring or using the serial port failed.
    #[error(transparent)]
    SerialPort(#[from] SerialPortError),

    /// The operator picked a device that isn't in the list.
    #[error("Selection {index} is out of range, there are {len} candidate(s)")]
    SelectionOutOfRange {
        /// What was picked.
        index: i64,

        /// How many there were to pick from.
        len: usize,
    },

    /// Shutdown was asked to close a port someone else still holds.
    #[error("The port `{0}` is still in use elsewhere")]
    PortStillShared(String),

    /// The receiving thread could not be started.
    #[error("Could not start the receive loop")]
    ReceiverSpawn(#[source] io::Error),

    /// The receiving thread panicked.
    #[error("The receive loop panicked")]
    ReceiverPanicked,

    /// Terminal or console IO.
    #[error("Underlying IO problem")]
    Io(#[from] io::Error),

    /// The configuration is not usable.
    #[error("Bad configuration: {0}")]
    BadConfig(String),
}

impl Error {
    /// Get the message of a bad configuration, if that is what this is.
    pub fn try_into_bad_config(self) -> Result<String, Self> {
        if let Self::BadConfig(v) = self {
            Ok(v)
        } else {
            Err(self)
        }
    }
}
