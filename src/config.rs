use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use serialport::FlowControl;

use crate::{engine::DEFAULT_HEARTBEAT, error::Error, serial::serial_port::DEFAULT_BAUD};

/// The serial port used if none is configured.
#[cfg(windows)]
pub const DEFAULT_SERIAL_PATH: &str = "COM2";

/// The serial port used if none is configured.
#[cfg(not(windows))]
pub const DEFAULT_SERIAL_PATH: &str = "/dev/ttyACM0";

/// How to reach the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Likely "/dev/ttyACMx" or "COMx".
    pub path: String,

    /// Baud rate.
    pub baud: u32,

    /// Flow control.
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_SERIAL_PATH.into(),
            baud: DEFAULT_BAUD,
            flow_control: FlowControl::None,
        }
    }
}

/// The configuration used for running the server.
///
/// Every field may be left out of a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The device's serial port.
    pub serial: SerialConfig,

    /// How often to re-broadcast the state, in milliseconds.
    pub heartbeat_ms: u64,

    /// The port to serve HTTP and websockets on.
    pub http_port: u16,

    /// If the serial port cannot be opened, run anyway without commands.
    /// Otherwise startup fails.
    pub start_without_device: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            heartbeat_ms: DEFAULT_HEARTBEAT.as_millis() as u64,
            http_port: 3000,
            start_without_device: true,
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

    /// An example configuration with the fields filled in.
    pub fn example() -> Self {
        Self {
            serial: SerialConfig {
                path: "/dev/serial/by-id/usb-Arduino_Uno-if00".into(),
                baud: 115200,
                flow_control: FlowControl::None,
            },
            heartbeat_ms: 250,
            http_port: 8080,
            start_without_device: false,
        }
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> String {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .unwrap_or_else(|e| format!("Could not serialize the configuration: {e}"))
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        let path = p.as_ref();

        let s = std::fs::read_to_string(path)
            .map_err(|e| Error::BadConfig(format!("Could not read {path:?}: {e}")))?;

        Self::deserialize(&s)
    }

    /// The heartbeat period.
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), Error> {
        if self.serial.path.trim().is_empty() {
            return Err(Error::BadConfig("The serial port path is empty".into()));
        }

        if self.serial.baud == 0 {
            return Err(Error::BadConfig(format!(
                "The baud rate for {} must be larger than zero",
                self.serial.path
            )));
        }

        if self.heartbeat_ms == 0 {
            return Err(Error::BadConfig(
                "The heartbeat must be at least one millisecond".into(),
            ));
        }

        Ok(())
    }
}
