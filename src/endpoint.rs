use std::fmt::Display;

use futures::channel::mpsc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::serial::{SerialMessage, SerialMessageBytes};

pub(crate) mod mock;
pub(crate) mod serial;

/// Identifies the transport the device is reached through.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone)]
pub enum EndpointId {
    /// A tty/COM endpoint.
    Tty(String),

    /// An in-memory device.
    Mock(String),
}

impl Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointId::Tty(tty) => {
                // Reduce log verbosity
                let tty = tty.strip_prefix("/dev/serial/by-id/").unwrap_or(tty);

                write!(f, "tty: {tty}")
            }
            EndpointId::Mock(mock) => write!(f, "mock: {mock}"),
        }
    }
}

/// An event on an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointEvent {
    /// The endpoint put the given message on wire.
    ToWire(SerialMessageBytes),

    /// The endpoint received the following line from wire.
    /// The delimiter is not included.
    FromWire(SerialMessageBytes),
}

impl Display for EndpointEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            EndpointEvent::ToWire(b) => {
                write!(f, "ToWire: {}", SerialMessage::new_lossy(b))
            }
            EndpointEvent::FromWire(b) => {
                write!(f, "FromWire: {}", SerialMessage::new_lossy(b))
            }
        }
    }
}

impl EndpointEvent {
    /// Attempt to unwrap the event as something that was sent to wire.
    pub fn as_to_wire(&self) -> Option<&SerialMessageBytes> {
        if let Self::ToWire(v) = self {
            Some(v)
        } else {
            None
        }
    }

    /// Attempt to unwrap the event as something that was received from wire.
    pub fn as_from_wire(&self) -> Option<&SerialMessageBytes> {
        if let Self::FromWire(v) = self {
            Some(v)
        } else {
            None
        }
    }
}

/// An endpoint is something which can accept serial messages for writing,
/// and generates serial messages for reading.
///
/// Having one means the transport was successfully opened.
/// Dropping it closes the transport.
pub trait Endpoint: Send + Sync {
    /// Get a receiver of what happens on the wire.
    /// Only events after subscribing are seen.
    fn events(&self) -> broadcast::Receiver<EndpointEvent>;

    /// Bytes sent here are put on the wire as is.
    fn message_sender(&self) -> mpsc::UnboundedSender<SerialMessageBytes>;

    /// Which endpoint this is.
    fn id(&self) -> EndpointId;
}
