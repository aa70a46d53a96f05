use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors thay may occur in this library.
///
/// Transport problems are reported here but never stop the engine:
/// it keeps broadcasting the best known state.
#[derive(Debug, Error, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub enum Error {
    /// The connection to the device could not be opened.
    #[error("Could not connect to the device: {0}")]
    Connection(String),

    /// A line could not be handed to the device.
    #[error("Could not write to the device: {0}")]
    Write(String),

    /// There is no device connection, so commands are disabled.
    #[error("No device connection, commands are disabled")]
    NotConnected,

    /// The engine has been closed.
    #[error("The engine is not running")]
    EngineStopped,

    /// Bad json.
    #[error("The request `{request}` could not be deserialized. Problem: {problem}")]
    BadJson {
        /// The problematic request.
        request: String,

        /// The deserialization issue.
        problem: String,
    },

    /// The HTTP server could not be started or stopped unexpectedly.
    #[error("Server problem: {0}")]
    Server(String),

    /// The configuration is not usable.
    #[error("Bad configuration: {0}")]
    BadConfig(String),
}

impl Error {
    /// If this is a bad config error, get the problem description.
    pub fn try_into_bad_config(self) -> Result<String, Self> {
        if let Self::BadConfig(v) = self {
            Ok(v)
        } else {
            Err(self)
        }
    }
}
