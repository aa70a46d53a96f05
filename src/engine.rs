//! The engine owns the device state.
//!
//! Lines from the endpoint and heartbeat ticks are handled one at a time by a single task.
//! Everything observers see is enqueued on the fan-out in that same order.

use std::time::Duration;

use futures::{channel::mpsc, future};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use crate::{
    broadcast::{Broadcast, FanOut, FanOutHandle, Interest, Origin, StateUpdate, Subscription},
    command::Command,
    endpoint::{Endpoint, EndpointEvent, EndpointId},
    error::Error,
    protocol::{decode, normalize},
    serial::{SerialMessage, SerialMessageBytes},
    state::DeviceState,
};

/// How often the state is re-broadcast if nothing else is set.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(500);

/// Builder for an [`Engine`].
pub struct EngineBuilder {
    heartbeat: Duration,
    endpoint: Option<Box<dyn Endpoint>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Start a new builder.
    /// Without an endpoint the engine runs degraded: it broadcasts, but cannot send commands.
    pub fn new() -> Self {
        Self {
            heartbeat: DEFAULT_HEARTBEAT,
            endpoint: None,
        }
    }

    /// Set the heartbeat period.
    pub fn heartbeat(mut self, period: Duration) -> Self {
        self.heartbeat = period;
        self
    }

    /// Set the endpoint the device is reached through.
    pub fn endpoint(mut self, endpoint: impl Endpoint + 'static) -> Self {
        self.endpoint = Some(Box::new(endpoint));
        self
    }

    /// Start the engine.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Engine {
        let period = if self.heartbeat.is_zero() {
            warn!("A zero heartbeat is not possible, using {DEFAULT_HEARTBEAT:?}");
            DEFAULT_HEARTBEAT
        } else {
            self.heartbeat
        };

        let (fan_out, fan_out_handle) = FanOut::new();
        let (state_sender, state_receiver) = watch::channel(DeviceState::default());
        let token = CancellationToken::new();

        // Subscribe right away, lines said after this returns must not be missed.
        let events = self.endpoint.as_ref().map(|endpoint| endpoint.events());
        let commands = self.endpoint.as_ref().map(|endpoint| endpoint.message_sender());
        let endpoint_id = self.endpoint.as_ref().map(|endpoint| endpoint.id());

        match &endpoint_id {
            Some(id) => info!(%id, ?period, "Starting engine"),
            None => warn!(?period, "Starting engine without a device, commands are disabled"),
        }

        let span = match &endpoint_id {
            Some(id) => info_span!("engine", %id),
            None => info_span!("engine", id = "none"),
        };

        let processor = Processor {
            state: DeviceState::default(),
            sequence: 0,
            fan_out: fan_out_handle.clone(),
            state_sender,
        };

        let engine_task = tokio::spawn(
            run(processor, self.endpoint, events, period, token.clone()).instrument(span),
        );
        let fan_out_task = tokio::spawn(fan_out.run().instrument(info_span!("fan-out")));

        Engine {
            handle: EngineHandle {
                fan_out: fan_out_handle,
                state: state_receiver,
                commands,
                endpoint: endpoint_id,
                heartbeat: period,
                token: token.clone(),
            },
            engine_task,
            fan_out_task,
            guard: token.drop_guard(),
        }
    }
}

/// A running engine.
///
/// Use [`Engine::handle`] to observe it and send commands.
/// Dropping this stops the engine without waiting for it.
/// Subscriptions still get what was queued before the stop and then end.
/// See [`Engine::close`] to wait for all of that.
#[derive(Debug)]
pub struct Engine {
    handle: EngineHandle,
    engine_task: JoinHandle<()>,
    fan_out_task: JoinHandle<()>,
    guard: DropGuard,
}

impl Engine {
    /// A handle to this engine.
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stop the heartbeat, release the endpoint, and deliver what is already queued.
    ///
    /// Subscriptions see the remaining broadcasts and then end.
    pub async fn close(self) {
        info!("Closing engine");

        self.guard.disarm().cancel();

        if let Err(e) = self.engine_task.await {
            error!(%e, "Engine task did not stop cleanly");
        }

        // In case the engine task did not get to it.
        self.handle.fan_out.close();

        if let Err(e) = self.fan_out_task.await {
            error!(%e, "Fan-out task did not stop cleanly");
        }

        info!("Engine closed");
    }
}

/// Cheap to clone access to a running [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineHandle {
    fan_out: FanOutHandle,
    state: watch::Receiver<DeviceState>,
    commands: Option<mpsc::UnboundedSender<SerialMessageBytes>>,
    endpoint: Option<EndpointId>,
    heartbeat: Duration,
    token: CancellationToken,
}

impl EngineHandle {
    /// The latest state.
    pub fn state(&self) -> DeviceState {
        *self.state.borrow()
    }

    /// Receive every state broadcast, transitions and heartbeats alike.
    pub fn subscribe(&self) -> Subscription {
        self.fan_out.subscribe(Interest::States)
    }

    /// Receive every non-empty line from the device, before it is decoded.
    pub fn subscribe_raw(&self) -> Subscription {
        self.fan_out.subscribe(Interest::Lines)
    }

    /// Receive lines and states, in the order they happened.
    pub fn subscribe_all(&self) -> Subscription {
        self.fan_out.subscribe(Interest::Everything)
    }

    /// Send a command to the device.
    ///
    /// The state is not changed by this.
    /// The device reports back with a line if the command had an effect.
    pub fn command(&self, command: &Command) -> Result<(), Error> {
        if self.token.is_cancelled() {
            return Err(Error::EngineStopped);
        }

        let commands = self.commands.as_ref().ok_or(Error::NotConnected)?;

        commands.unbounded_send(command.encode()).map_err(|e| {
            warn!(%command, %e, "Command could not be sent");
            Error::Write(e.to_string())
        })?;

        debug!(%command, "Command sent");

        Ok(())
    }

    /// Whether commands can be sent.
    pub fn is_connected(&self) -> bool {
        self.commands.is_some()
    }

    /// The endpoint in use, if any.
    pub fn endpoint(&self) -> Option<&EndpointId> {
        self.endpoint.as_ref()
    }

    /// The heartbeat period in use.
    pub fn heartbeat(&self) -> Duration {
        self.heartbeat
    }
}

struct Processor {
    state: DeviceState,
    sequence: u64,
    fan_out: FanOutHandle,
    state_sender: watch::Sender<DeviceState>,
}

impl Processor {
    fn on_line(&mut self, bytes: &[u8]) {
        let raw = SerialMessage::new_lossy(bytes);

        let Some(line) = normalize(raw.as_str()) else {
            trace!("Skipping empty line");
            return;
        };

        self.fan_out
            .broadcast(Broadcast::Line(raw.as_str().trim().into()));

        let event = decode(&line);
        let next = self.state.apply(&event);

        if next == self.state {
            trace!(%line, %event, "No change");
        } else {
            debug!(%line, %event, from = %self.state, to = %next, "Transition");
        }

        self.state = next;
        self.state_sender.send_replace(next);

        self.publish(Origin::Transition);
    }

    fn publish(&mut self, origin: Origin) {
        let update = StateUpdate {
            sequence: self.sequence,
            origin,
            state: self.state,
        };
        self.sequence += 1;

        self.fan_out.broadcast(Broadcast::State(update));
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<EndpointEvent>>,
) -> Result<EndpointEvent, broadcast::error::RecvError> {
    match events {
        Some(events) => events.recv().await,
        None => future::pending().await,
    }
}

async fn run(
    mut processor: Processor,
    endpoint: Option<Box<dyn Endpoint>>,
    mut events: Option<broadcast::Receiver<EndpointEvent>>,
    period: Duration,
    token: CancellationToken,
) {
    let mut heartbeat = interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => {
                debug!("Cancelled");
                break;
            }

            event = next_event(&mut events) => match event {
                Ok(EndpointEvent::FromWire(bytes)) => processor.on_line(&bytes),
                Ok(EndpointEvent::ToWire(bytes)) => {
                    trace!("Written: {}", SerialMessage::new_lossy(bytes));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Lagging behind the device, {skipped} line(s) lost");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    error!("Endpoint closed, continuing without a device");
                    events = None;
                }
            },

            _ = heartbeat.tick() => {
                trace!("Heartbeat");
                processor.publish(Origin::Heartbeat);
            }
        }
    }

    if let Some(endpoint) = endpoint {
        info!(id = %endpoint.id(), "Releasing endpoint");
    }

    // Nothing more will be broadcast.
    processor.fan_out.close();

    info!("Engine stopped");
}
