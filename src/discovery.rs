use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::Error;

/// A family of device names, like the glob `/dev/ttyUSB*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceFamily {
    /// The directory the devices live in.
    pub dir: PathBuf,

    /// What the file names start with.
    pub prefix: String,
}

impl DeviceFamily {
    /// Devices in `dir` with names starting with `prefix`.
    pub fn new<P: AsRef<Path>>(dir: P, prefix: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            prefix: prefix.to_owned(),
        }
    }

    /// USB to serial adapters, such as the CP2102.
    pub fn usb() -> Self {
        Self::new("/dev", "ttyUSB")
    }

    /// USB CDC ACM devices.
    pub fn acm() -> Self {
        Self::new("/dev", "ttyACM")
    }

    /// Matching paths, sorted.
    /// A missing or unreadable directory has no matches.
    fn matches(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(family = %self, ?e, "Could not read device directory");
                return vec![];
            }
        };

        entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(&self.prefix))
            .map(|entry| entry.path())
            .sorted()
            .collect()
    }
}

impl Display for DeviceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}*", self.dir.join(&self.prefix).display())
    }
}

/// Finds candidate devices.
#[derive(Debug, Clone)]
pub struct Discovery {
    families: Vec<DeviceFamily>,
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new(vec![DeviceFamily::usb(), DeviceFamily::acm()])
    }
}

impl Discovery {
    /// Look for devices in these families, in this order.
    pub fn new(families: Vec<DeviceFamily>) -> Self {
        Self { families }
    }

    /// The families searched.
    pub fn families(&self) -> &[DeviceFamily] {
        &self.families
    }

    /// Fresh list of candidates.
    ///
    /// Earlier families' matches always come before later ones'.
    /// An empty result is not an error, the caller decides whether to retry.
    pub fn scan(&self) -> Candidates {
        let paths = self
            .families
            .iter()
            .flat_map(DeviceFamily::matches)
            .collect::<Vec<_>>();

        trace!(found = paths.len(), "Scanned for devices");

        Candidates { paths }
    }
}

/// The result of one [`Discovery::scan`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Candidates {
    paths: Vec<PathBuf>,
}

impl Candidates {
    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// No devices found.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// All candidates, in order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// See [`select`].
    pub fn select(&self, index: i64) -> Result<&Path, Error> {
        select(&self.paths, index)
    }
}

/// Pick a candidate by its position.
/// Fails unless `0 <= index < candidates.len()`.
pub fn select(candidates: &[PathBuf], index: i64) -> Result<&Path, Error> {
    usize::try_from(index)
        .ok()
        .and_then(|i| candidates.get(i))
        .map(PathBuf::as_path)
        .ok_or(Error::SelectionOutOfRange {
            index,
            len: candidates.len(),
        })
}

/// What a USB serial device says about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Vendor id.
    pub vid: u16,

    /// Product id.
    pub pid: u16,

    /// Manufacturer string, if any.
    pub manufacturer: Option<String>,

    /// Product string, if any.
    pub product: Option<String>,

    /// Serial number, if any.
    pub serial_number: Option<String>,
}

impl Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Vendor: {:04x}  Product: {:04x}", self.vid, self.pid)?;

        if let Some(manufacturer) = &self.manufacturer {
            write!(f, "\n   Manufacturer: {manufacturer}")?;
        }
        if let Some(product) = &self.product {
            write!(f, "\n   Product: {product}")?;
        }
        if let Some(serial_number) = &self.serial_number {
            write!(f, "\n   Serial: {serial_number}")?;
        }

        Ok(())
    }
}

/// Look up USB details for a device path.
///
/// Informational only. Anything going wrong just means no details.
pub fn device_info(path: &Path) -> Option<DeviceInfo> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            debug!(?e, "Could not list serial ports");
            return None;
        }
    };

    ports
        .into_iter()
        .filter(|port| Path::new(&port.port_name) == path)
        .find_map(|port| match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => Some(DeviceInfo {
                vid: usb.vid,
                pid: usb.pid,
                manufacturer: usb.manufacturer,
                product: usb.product,
                serial_number: usb.serial_number,
            }),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn select_in_range() {
        let candidates = paths(&["/dev/ttyUSB0", "/dev/ttyACM0"]);

        assert_eq!(select(&candidates, 0).unwrap(), Path::new("/dev/ttyUSB0"));
        assert_eq!(select(&candidates, 1).unwrap(), Path::new("/dev/ttyACM0"));
    }

    #[test]
    fn select_out_of_range() {
        let candidates = paths(&["/dev/ttyUSB0", "/dev/ttyACM0"]);

        for index in [-100, -1, 2, 3, i64::MAX, i64::MIN] {
            assert!(matches!(
                select(&candidates, index),
                Err(Error::SelectionOutOfRange { len: 2, .. })
            ));
        }
    }

    #[test]
    fn select_from_nothing() {
        for index in [-1, 0, 1] {
            assert!(matches!(
                select(&[], index),
                Err(Error::SelectionOutOfRange { len: 0, .. })
            ));
        }
    }

    #[test]
    fn missing_directory_has_no_matches() {
        let discovery = Discovery::new(vec![DeviceFamily::new(
            "/this/directory/does/not/exist",
            "ttyUSB",
        )]);

        assert!(discovery.scan().is_empty());
    }

    #[test]
    fn family_display() {
        assert_eq!(DeviceFamily::usb().to_string(), "/dev/ttyUSB*");
        assert_eq!(DeviceFamily::acm().to_string(), "/dev/ttyACM*");
    }
}
