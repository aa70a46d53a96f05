//! A mock endpoint.
//! Behaves like a device on a serial port, but lives in memory.

use futures::channel::mpsc;
use tokio::sync::broadcast;

use super::{Endpoint, EndpointEvent, EndpointId};
use crate::{mock::MockHandle, serial::SerialMessageBytes};

impl Endpoint for MockHandle {
    fn events(&self) -> broadcast::Receiver<EndpointEvent> {
        self.broadcast_sender.subscribe()
    }

    fn message_sender(&self) -> mpsc::UnboundedSender<SerialMessageBytes> {
        self.should_put_on_wire_sender.clone()
    }

    fn id(&self) -> EndpointId {
        EndpointId::Mock(self.name.clone())
    }
}
