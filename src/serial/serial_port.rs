use std::time::Duration;

use futures::{
    channel::mpsc::{self, UnboundedSender},
    future, stream, SinkExt, StreamExt,
};
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::Decoder;
use tracing::{error, info, info_span, trace, warn, Instrument};

use crate::{
    endpoint::EndpointEvent,
    error::Error,
    serial::{codecs::lines::LinesCodec, error::SerialPortError, SerialMessageBytes},
};

/// The baud rate used if none is set.
pub const DEFAULT_BAUD: u32 = 9600;

const REOPEN_DELAY: Duration = Duration::from_secs(3);

/// Builder for a [`SerialPortHandle`].
#[derive(Debug, Default)]
pub struct SerialPortBuilder {
    baud: Option<u32>,
    flow_control: Option<serialport::FlowControl>,
    path: String,
}

fn try_create_serial_port(
    baud: u32,
    flow_control: serialport::FlowControl,
    path: &str,
) -> Result<SerialStream, SerialPortError> {
    tokio_serial::new(path, baud)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(flow_control)
        .open_native_async()
        .map_err(|e| SerialPortError::Open {
            path: path.to_string(),
            problem: e.to_string(),
        })
}

async fn loop_create_serial_port(
    baud: u32,
    flow_control: serialport::FlowControl,
    path: &str,
) -> SerialStream {
    info!("Attempting to reconnect to serial port at {}", path);
    loop {
        match try_create_serial_port(baud, flow_control, path) {
            Ok(serial_stream) => {
                info!("Reconnected to serial port at {}", path);
                return serial_stream;
            }
            Err(e) => {
                error!(%e, "Serial port connection error. Retrying in {REOPEN_DELAY:?}...");
                tokio::time::sleep(REOPEN_DELAY).await;
            }
        }
    }
}

fn publish(sender: &broadcast::Sender<EndpointEvent>, event: EndpointEvent) {
    match sender.send(event) {
        Ok(listeners) => {
            trace!("Broadcasted serial event to {listeners} listener(s)")
        }
        Err(e) => {
            warn!("Send error in broadcast: {e:?}")
        }
    }
}

impl SerialPortBuilder {
    /// Start a new builder.
    /// The tty should likely be along the lines of `/dev/ttyACMx` on unix, and `COMx` on Windows.
    pub fn new(tty: &str) -> Self {
        Self {
            path: tty.to_string(),
            ..Default::default()
        }
    }

    /// Set the serial port builder's baud.
    /// Will use [`DEFAULT_BAUD`] if not set.
    pub fn set_baud(mut self, baud: u32) -> Self {
        self.baud = Some(baud);
        self
    }

    /// Set the flow control. None if not set.
    pub fn set_flow_control(mut self, flow_control: serialport::FlowControl) -> Self {
        self.flow_control = Some(flow_control);
        self
    }

    /// Open the port and start reading lines from it.
    ///
    /// Fails if the port cannot be opened right away.
    /// If it breaks later on, it is re-opened in the background.
    pub fn build(self) -> Result<SerialPortHandle, Error> {
        let baud = self.baud.unwrap_or(DEFAULT_BAUD);
        let flow_control = self.flow_control.unwrap_or(serialport::FlowControl::None);

        info!(%self.path, %baud, ?flow_control, "Starting serial port handler");

        let mut opened = Some(try_create_serial_port(baud, flow_control, &self.path)?);

        enum Event {
            PleasePutThisOnWire(SerialMessageBytes),
            ThisCameFromWire(Result<SerialMessageBytes, SerialPortError>),
            WireClosed,
        }

        let (should_put_on_wire_sender, should_put_on_wire_receiver) = mpsc::unbounded();

        let mut should_put_on_wire_receiver =
            Box::pin(should_put_on_wire_receiver.map(Event::PleasePutThisOnWire));

        // Outsiders will be getting observing messages from this broadcast.
        let (broadcast_sender, _) = broadcast::channel(1024);

        let broadcast_sender_task = broadcast_sender.clone();

        let tty_span = info_span!("tty", %self.path);

        let path = self.path.clone();
        let codec = LinesCodec::default();

        let handle = tokio::spawn(
            async move {
                loop {
                    let serial_stream = match opened.take() {
                        Some(serial_stream) => serial_stream,
                        None => loop_create_serial_port(baud, flow_control, &path).await,
                    };

                    // Sink: Send things (to serial port), stream: receive things (from serial port)
                    let (mut sink, from_wire) = codec.clone().framed(serial_stream).split();

                    let from_wire = from_wire
                        .map(Event::ThisCameFromWire)
                        .chain(stream::once(future::ready(Event::WireClosed)));

                    let mut events = stream::select(from_wire, &mut should_put_on_wire_receiver);

                    while let Some(event) = events.next().await {
                        match event {
                            Event::PleasePutThisOnWire(message) => {
                                match sink.send(message.clone()).await {
                                    Ok(()) => publish(
                                        &broadcast_sender_task,
                                        EndpointEvent::ToWire(message),
                                    ),
                                    Err(e) => {
                                        error!(%e, "Serial port error in send, message dropped");
                                        break;
                                    }
                                }
                            }
                            Event::ThisCameFromWire(Ok(message)) => {
                                trace!(
                                    "Message from port: `{:?}`",
                                    &message[..message.len().min(32)]
                                );

                                publish(&broadcast_sender_task, EndpointEvent::FromWire(message));
                            }
                            Event::ThisCameFromWire(Err(e)) => {
                                error!(%e, "Serial port error");
                                break;
                            }
                            Event::WireClosed => {
                                warn!("Serial port closed");
                                break;
                            }
                        }
                    }

                    tokio::time::sleep(REOPEN_DELAY).await;
                }
            }
            .instrument(tty_span),
        );

        Ok(SerialPortHandle {
            tty: self.path,
            handle,
            serial_tx: should_put_on_wire_sender,
            broadcast_tx: broadcast_sender,
        })
    }
}

/// An open serial port.
///
/// The port is closed when this is dropped.
#[derive(Debug)]
pub struct SerialPortHandle {
    pub(crate) tty: String,
    pub(crate) handle: JoinHandle<()>,
    pub(crate) serial_tx: UnboundedSender<SerialMessageBytes>,
    pub(crate) broadcast_tx: broadcast::Sender<EndpointEvent>,
}

impl Drop for SerialPortHandle {
    fn drop(&mut self) {
        info!(tty = %self.tty, "Closing serial port");
        self.handle.abort();
    }
}
