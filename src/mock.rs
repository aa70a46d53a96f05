//! A mock device, useful to run and test without the actual serial port.
//!
//! Lines the device "says" are produced with [`MockHandle::say`].
//! Lines written to it show up as [`EndpointEvent::ToWire`] events.
//! With loopback enabled, written lines are also echoed back as if the device said them.

use futures::{channel::mpsc, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, info_span, trace, warn, Instrument};

use crate::{endpoint::EndpointEvent, serial::SerialMessageBytes};

/// Builder for a [`MockHandle`].
#[derive(Debug)]
pub struct MockBuilder {
    name: String,
    loopback: bool,
}

impl MockBuilder {
    /// Start a new builder for a mock with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            loopback: false,
        }
    }

    /// Echo each written line back as a line from the device.
    pub fn set_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    /// Start the mock.
    #[must_use]
    pub fn build(self) -> MockHandle {
        info!(%self.name, loopback = self.loopback, "Running mock");

        // Listen to this internally.
        // If anything appears, put it on the broadcast.
        let (should_put_on_wire_sender, mut should_put_on_wire_receiver) =
            mpsc::unbounded::<SerialMessageBytes>();

        // Outsiders will be getting observing messages from this broadcast.
        let (broadcast_sender, _) = broadcast::channel(1024);

        let broadcast_sender_task = broadcast_sender.clone();
        let loopback = self.loopback;

        tokio::spawn(
            async move {
                while let Some(message) = should_put_on_wire_receiver.next().await {
                    let message = String::from_utf8_lossy(&message);

                    let newlines = message.chars().filter(|c| c == &'\n').count();
                    debug!(
                        "Got message of length {} with #{newlines} newlines",
                        message.len()
                    );

                    // Each line is its own wire event, as a serial port would see it.
                    for line in message.lines() {
                        let line = line.to_owned().into_bytes();

                        send(&broadcast_sender_task, EndpointEvent::ToWire(line.clone()));

                        if loopback {
                            send(&broadcast_sender_task, EndpointEvent::FromWire(line));
                        }
                    }
                }

                debug!("Mock endpoint stopped receiving");
            }
            .instrument(info_span!("mock")),
        );

        MockHandle {
            name: self.name,
            should_put_on_wire_sender,
            broadcast_sender,
        }
    }
}

fn send(sender: &broadcast::Sender<EndpointEvent>, event: EndpointEvent) {
    match sender.send(event) {
        Ok(listeners) => {
            trace!("Broadcasted mock event to {listeners} listener(s)")
        }
        Err(e) => {
            warn!("Send error in broadcast: {e:?}")
        }
    }
}

/// A running mock device.
///
/// Clones refer to the same device.
#[derive(Debug, Clone)]
pub struct MockHandle {
    pub(crate) name: String,

    // Used for giving out senders (via clone)
    pub(crate) should_put_on_wire_sender: mpsc::UnboundedSender<SerialMessageBytes>,

    // Used for giving out receivers (via subscribe)
    pub(crate) broadcast_sender: broadcast::Sender<EndpointEvent>,
}

impl MockHandle {
    /// Make the device emit a line, as if it was read from the wire.
    ///
    /// Returns how many listeners saw it.
    pub fn say<S: AsRef<str>>(&self, line: S) -> usize {
        let line = line.as_ref().as_bytes().to_vec();

        self.broadcast_sender
            .send(EndpointEvent::FromWire(line))
            .unwrap_or_else(|_| {
                warn!(mock = %self.name, "Nobody is listening to the mock");
                0
            })
    }
}
