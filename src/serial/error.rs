use std::{io, path::PathBuf};

use thiserror::Error;

/// Any error the serial port might encounter.
#[derive(Debug, Error)]
pub enum SerialPortError {
    /// The device could not be opened.
    #[error("Could not open serial port at {path:?}")]
    Open {
        /// The device asked for.
        path: PathBuf,

        /// What the OS said.
        source: io::Error,
    },

    /// The path exists but is not a character device.
    #[error("{0:?} is not a character device")]
    NotACharacterDevice(PathBuf),

    /// The line attributes could not be read or committed.
    #[cfg(unix)]
    #[error("Could not configure the line")]
    Config(#[source] nix::Error),

    /// The line runs at a speed this program does not know about.
    #[error("The line runs at an unrecognized speed")]
    UnrecognizedSpeed,

    /// Reading failed for a reason other than having nothing to read.
    #[error("Problem reading from the port")]
    Read(#[source] io::Error),

    /// Writing failed.
    #[error("Problem writing to the port")]
    Write(#[source] io::Error),

    /// Releasing the descriptor failed.
    #[cfg(unix)]
    #[error("Problem closing the port")]
    Close(#[source] nix::Error),

    /// The port was used after being closed.
    #[error("The port is closed")]
    Closed,
}
