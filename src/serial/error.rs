use std::io;

use thiserror::Error;

use crate::error::Error;

/// Problems inside the serial port task.
/// These never leave the transport boundary as is, see the [`From`] impl below.
#[derive(Debug, Error)]
pub enum SerialPortError {
    /// IO related errors.
    #[error("Underlying IO problem: {0}")]
    IO(#[from] io::Error),

    /// The port could not be opened.
    #[error("Could not open port at {path}, problem: {problem}")]
    Open {
        /// The port path.
        path: String,

        /// What went wrong.
        problem: String,
    },
}

impl From<SerialPortError> for Error {
    fn from(e: SerialPortError) -> Self {
        match e {
            SerialPortError::Open { .. } => Error::Connection(e.to_string()),
            SerialPortError::IO(_) => Error::Write(e.to_string()),
        }
    }
}
