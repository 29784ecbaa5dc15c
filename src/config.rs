use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    discovery::DeviceFamily,
    error::Error,
    serial::{BaudRate, LineSettings},
};

/// Defaults for a session.
///
/// Only ever read, never written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where to look for devices, in order.
    pub device_families: Vec<DeviceFamily>,

    /// The line settings the device is opened with.
    pub line: LineSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_families: vec![DeviceFamily::usb(), DeviceFamily::acm()],
            line: LineSettings::new(BaudRate::B115200),
        }
    }
}

impl Config {
    fn ron() -> ron::Options {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
    }

    /// Deserialize a .ron file's contents.
    pub fn deserialize(input: &str) -> Result<Self, Error> {
        Self::ron()
            .from_str::<Config>(input)
            .map_err(|e| Error::BadConfig(format!("Not a valid configuration: {e}")))
    }

    /// An example configuration with some fields filled in.
    pub fn example() -> Self {
        Self {
            device_families: vec![
                DeviceFamily::usb(),
                DeviceFamily::acm(),
                DeviceFamily::new("/dev/serial/by-id", "usb-Silicon_Labs"),
            ],
            ..Default::default()
        }
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> Result<String, Error> {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::BadConfig(format!("Could not serialize: {e}")))
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        let s = std::fs::read_to_string(p)?;

        let config = Self::deserialize(&s)?;
        config.validate()?;

        Ok(config)
    }

    fn check_families_present(&self) -> Result<(), Error> {
        if self.device_families.is_empty() {
            return Err(Error::BadConfig(
                "At least one device family is needed to find devices.".into(),
            ));
        }

        Ok(())
    }

    fn check_prefixes_non_empty(&self) -> Result<(), Error> {
        for (index, family) in self.device_families.iter().enumerate() {
            if family.prefix.is_empty() {
                return Err(Error::BadConfig(format!("The device family with index {index} (zero indexed) has an empty prefix, which would match everything in {:?}.", family.dir)));
            }
        }

        Ok(())
    }

    fn check_duplicate_families(&self) -> Result<(), Error> {
        let duplicates = self
            .device_families
            .iter()
            .duplicates()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        if duplicates.is_empty() {
            Ok(())
        } else {
            Err(Error::BadConfig(format!(
                "Device families are listed more than once, devices would be offered twice. Duplicates: {duplicates:?}"
            )))
        }
    }

    /// Check the configuration makes sense.
    pub fn validate(&self) -> Result<(), Error> {
        self.check_families_present()?;
        self.check_prefixes_non_empty()?;
        self.check_duplicate_families()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::serial::{DataBits, Parity, StopBits};

    #[test]
    fn serialize() {
        let c = Config::example();

        println!("{}", c.serialize_pretty().unwrap());
    }

    #[test]
    fn example_survives_ron() {
        let c = Config::example();

        let again = Config::deserialize(&c.serialize_pretty().unwrap()).unwrap();

        assert_eq!(c, again);
    }

    #[test]
    fn deserialize() {
        let input = r#"
(
    device_families: [
        (
            dir: "/dev",
            prefix: "ttyUSB",
        ),
    ],
    line: (
        baud: B9600,
        data_bits: Seven,
        parity: Odd,
        stop_bits: Two,
    ),
)
"#;
        let config = Config::deserialize(input).unwrap();

        assert_eq!(config.device_families, vec![DeviceFamily::usb()]);
        assert_eq!(
            config.line,
            LineSettings {
                baud: BaudRate::B9600,
                data_bits: DataBits::Seven,
                parity: Parity::Odd,
                stop_bits: StopBits::Two,
            }
        );
    }

    #[test]
    fn omitted_fields_use_defaults() {
        let config = Config::deserialize("()").unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn bad_config_no_families() {
        let c = Config {
            device_families: vec![],
            ..Default::default()
        };

        let err = c.validate().unwrap_err().try_into_bad_config().unwrap();

        assert!(err.contains("At least one"));
    }

    #[test]
    fn bad_config_empty_prefix() {
        let c = Config {
            device_families: vec![DeviceFamily::usb(), DeviceFamily::new("/dev", "")],
            ..Default::default()
        };

        let err = c.validate().unwrap_err().try_into_bad_config().unwrap();

        // Error message countains the index of our bad family
        assert!(err.contains("index 1"));
    }

    #[test]
    fn bad_config_duplicates() {
        let c = Config {
            device_families: vec![DeviceFamily::usb(), DeviceFamily::acm(), DeviceFamily::usb()],
            ..Default::default()
        };

        let err = c.validate().unwrap_err().try_into_bad_config().unwrap();

        assert!(err.contains("ttyUSB"));
        assert!(!err.contains("ttyACM"));
    }
}
