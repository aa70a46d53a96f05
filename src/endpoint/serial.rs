//! A serial port endpoint.

use futures::channel::mpsc;
use tokio::sync::broadcast;

use super::{Endpoint, EndpointEvent, EndpointId};
use crate::serial::{serial_port::SerialPortHandle, SerialMessageBytes};

impl Endpoint for SerialPortHandle {
    fn events(&self) -> broadcast::Receiver<EndpointEvent> {
        self.broadcast_tx.subscribe()
    }

    fn message_sender(&self) -> mpsc::UnboundedSender<SerialMessageBytes> {
        self.serial_tx.clone()
    }

    fn id(&self) -> EndpointId {
        EndpointId::Tty(self.tty.clone())
    }
}
