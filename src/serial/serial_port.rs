use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Write},
    os::unix::{
        fs::{FileTypeExt, OpenOptionsExt},
        io::{AsRawFd, IntoRawFd, RawFd},
    },
    path::Path,
};

use nix::{
    fcntl::{fcntl, FcntlArg, OFlag},
    sys::termios::{
        self, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg, SpecialCharacterIndices,
        Termios,
    },
};
use tracing::{debug, info, trace};

use super::{error::SerialPortError, BaudRate, DataBits, LineSettings, Parity, Port, StopBits};

/// Deciseconds a read may wait, see [`super::READ_TIMEOUT`].
const VTIME_DECISECONDS: u8 = 1;

/// A tty device in raw mode.
///
/// Only ever handed out fully configured.
#[derive(Debug)]
pub struct SerialPort {
    name: String,
    file: File,
}

impl SerialPort {
    /// Open the device at `path` in raw mode, 8N1 at (approximately) `baud`.
    ///
    /// Unsupported baud rates fall back to 9600.
    pub fn open<P: AsRef<Path>>(path: P, baud: u32) -> Result<Self, SerialPortError> {
        let path = path.as_ref().to_path_buf();
        let settings = LineSettings::new(BaudRate::from_requested(baud));

        // Non-blocking only for the open itself, so a missing carrier can't hang us.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags((OFlag::O_NOCTTY | OFlag::O_NONBLOCK).bits())
            .open(&path)
            .map_err(|source| SerialPortError::Open {
                path: path.clone(),
                source,
            })?;

        let is_char_device = file
            .metadata()
            .map_err(|source| SerialPortError::Open {
                path: path.clone(),
                source,
            })?
            .file_type()
            .is_char_device();

        if !is_char_device {
            return Err(SerialPortError::NotACharacterDevice(path));
        }

        let fd = file.as_raw_fd();
        clear_non_blocking(fd)?;

        let mut attributes = termios::tcgetattr(fd).map_err(SerialPortError::Config)?;
        apply(&mut attributes, &settings)?;
        termios::tcsetattr(fd, SetArg::TCSANOW, &attributes).map_err(SerialPortError::Config)?;

        let name = path.display().to_string();
        info!(%name, %settings, "Opened serial port");

        Ok(Self { name, file })
    }
}

fn clear_non_blocking(fd: RawFd) -> Result<(), SerialPortError> {
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(SerialPortError::Config)?;
    let flags = OFlag::from_bits_truncate(flags) - OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(SerialPortError::Config)?;

    Ok(())
}

/// Mutate an in-memory copy of the attributes.
/// Nothing reaches the device until the caller commits.
fn apply(attributes: &mut Termios, settings: &LineSettings) -> Result<(), SerialPortError> {
    let speed = match settings.baud {
        BaudRate::B9600 => termios::BaudRate::B9600,
        BaudRate::B115200 => termios::BaudRate::B115200,
    };
    termios::cfsetispeed(attributes, speed).map_err(SerialPortError::Config)?;
    termios::cfsetospeed(attributes, speed).map_err(SerialPortError::Config)?;

    let control = &mut attributes.control_flags;

    control.remove(ControlFlags::CSIZE);
    control.insert(match settings.data_bits {
        DataBits::Five => ControlFlags::CS5,
        DataBits::Six => ControlFlags::CS6,
        DataBits::Seven => ControlFlags::CS7,
        DataBits::Eight => ControlFlags::CS8,
    });

    match settings.parity {
        Parity::None => control.remove(ControlFlags::PARENB),
        Parity::Even => {
            control.insert(ControlFlags::PARENB);
            control.remove(ControlFlags::PARODD);
        }
        Parity::Odd => control.insert(ControlFlags::PARENB | ControlFlags::PARODD),
    }

    match settings.stop_bits {
        StopBits::One => control.remove(ControlFlags::CSTOPB),
        StopBits::Two => control.insert(ControlFlags::CSTOPB),
    }

    control.insert(ControlFlags::CLOCAL | ControlFlags::CREAD);

    attributes
        .local_flags
        .remove(LocalFlags::ICANON | LocalFlags::ECHO | LocalFlags::ECHOE | LocalFlags::ISIG);
    attributes
        .input_flags
        .remove(InputFlags::IXON | InputFlags::IXOFF | InputFlags::IXANY);
    attributes.output_flags.remove(OutputFlags::OPOST);

    // Return with whatever arrived within the timeout, possibly nothing.
    attributes.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
    attributes.control_chars[SpecialCharacterIndices::VTIME as usize] = VTIME_DECISECONDS;

    Ok(())
}

fn read_back(attributes: &Termios) -> Result<LineSettings, SerialPortError> {
    let baud = match termios::cfgetispeed(attributes) {
        termios::BaudRate::B9600 => BaudRate::B9600,
        termios::BaudRate::B115200 => BaudRate::B115200,
        _ => return Err(SerialPortError::UnrecognizedSpeed),
    };

    let control = attributes.control_flags;

    let size = control & ControlFlags::CSIZE;
    let data_bits = if size == ControlFlags::CS5 {
        DataBits::Five
    } else if size == ControlFlags::CS6 {
        DataBits::Six
    } else if size == ControlFlags::CS7 {
        DataBits::Seven
    } else {
        DataBits::Eight
    };

    let parity = if !control.contains(ControlFlags::PARENB) {
        Parity::None
    } else if control.contains(ControlFlags::PARODD) {
        Parity::Odd
    } else {
        Parity::Even
    };

    let stop_bits = if control.contains(ControlFlags::CSTOPB) {
        StopBits::Two
    } else {
        StopBits::One
    };

    Ok(LineSettings {
        baud,
        data_bits,
        parity,
        stop_bits,
    })
}

impl Port for SerialPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, SerialPortError> {
        match (&self.file).read(buf) {
            Ok(n) => {
                trace!(n, "Read from port");
                Ok(n)
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                Ok(0)
            }
            Err(e) => Err(SerialPortError::Read(e)),
        }
    }

    fn write(&self, bytes: &[u8]) -> Result<usize, SerialPortError> {
        (&self.file).write(bytes).map_err(SerialPortError::Write)
    }

    fn settings(&self) -> Result<LineSettings, SerialPortError> {
        let attributes =
            termios::tcgetattr(self.file.as_raw_fd()).map_err(SerialPortError::Config)?;

        read_back(&attributes)
    }

    fn reconfigure(&self, settings: &LineSettings) -> Result<(), SerialPortError> {
        let fd = self.file.as_raw_fd();

        let mut attributes = termios::tcgetattr(fd).map_err(SerialPortError::Config)?;
        apply(&mut attributes, settings)?;

        // The single commit. If it fails, whatever the OS kept is what the line runs with.
        termios::tcsetattr(fd, SetArg::TCSANOW, &attributes).map_err(SerialPortError::Config)?;

        info!(name = %self.name, %settings, "Reconfigured serial port");
        Ok(())
    }

    fn close(self) -> Result<(), SerialPortError> {
        debug!(name = %self.name, "Closing serial port");
        nix::unistd::close(self.file.into_raw_fd()).map_err(SerialPortError::Close)
    }
}
