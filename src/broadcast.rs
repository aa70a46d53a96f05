//! Fan-out of engine output to any number of observers.
//!
//! Everything the engine wants observers to see, and every (un)subscription,
//! goes through a single queue consumed by one task.
//! Observers therefore see broadcasts in exactly the order they were enqueued,
//! and heartbeats cannot interleave with transitions in any other way.
//!
//! Each observer has its own bounded queue of [`SUBSCRIBER_CAPACITY`].
//! An observer that does not keep up misses broadcasts while its queue is full,
//! without holding up the engine or the other observers.

use std::{
    collections::HashMap,
    fmt::Display,
    pin::Pin,
    task::{Context, Poll},
};

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::{serial::SerialMessage, state::DeviceState};

/// Why a state was broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Origin {
    /// A line from the device was applied (possibly changing nothing).
    Transition,

    /// The periodic re-broadcast.
    Heartbeat,
}

/// A snapshot as delivered to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    /// Increases by one for every state broadcast.
    pub sequence: u64,

    /// Why this was sent.
    pub origin: Origin,

    /// The state.
    pub state: DeviceState,
}

impl Display for StateUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {:?}: {}", self.sequence, self.origin, self.state)
    }
}

/// Something observers may receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Broadcast {
    /// A non-empty line exactly as the device sent it (trimmed).
    Line(SerialMessage),

    /// The device state.
    State(StateUpdate),
}

/// What an observer wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    /// Only [`Broadcast::State`].
    States,

    /// Only [`Broadcast::Line`].
    Lines,

    /// Both, interleaved in the order they happened.
    Everything,
}

impl Interest {
    fn wants(self, broadcast: &Broadcast) -> bool {
        matches!(
            (self, broadcast),
            (Interest::Everything, _)
                | (Interest::States, Broadcast::State(_))
                | (Interest::Lines, Broadcast::Line(_))
        )
    }
}

/// Identifies a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How many broadcasts may wait for a single observer.
pub const SUBSCRIBER_CAPACITY: usize = 256;

#[derive(Debug)]
pub(crate) enum FanOutRequest {
    Broadcast(Broadcast),
    Subscribe {
        id: SubscriptionId,
        interest: Interest,
        sender: mpsc::Sender<Broadcast>,
    },
    Unsubscribe(SubscriptionId),

    /// Deliver what is queued before this, then stop.
    Close,
}

/// A registered observer.
///
/// Broadcasts are received in order via [`Subscription::recv`] or as a [`Stream`].
/// Dropping the subscription unsubscribes.
/// After the engine closes, the remaining broadcasts can still be received,
/// after which `None` is returned.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::Receiver<Broadcast>,
    requests: mpsc::UnboundedSender<FanOutRequest>,
}

impl Subscription {
    /// The id of this subscription.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next broadcast.
    pub async fn recv(&mut self) -> Option<Broadcast> {
        self.receiver.recv().await
    }

    /// Get the next broadcast if one is ready.
    pub fn try_recv(&mut self) -> Option<Broadcast> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the next state, skipping any lines.
    pub async fn next_state(&mut self) -> Option<StateUpdate> {
        loop {
            if let Broadcast::State(update) = self.recv().await? {
                return Some(update);
            }
        }
    }

    /// Wait for the next line, skipping any states.
    pub async fn next_line(&mut self) -> Option<SerialMessage> {
        loop {
            if let Broadcast::Line(line) = self.recv().await? {
                return Some(line);
            }
        }
    }

    /// Stop receiving. Same as dropping.
    pub fn unsubscribe(self) {}
}

impl Stream for Subscription {
    type Item = Broadcast;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // If the fan-out is gone there is nothing to unsubscribe from.
        let _ = self.requests.send(FanOutRequest::Unsubscribe(self.id));
    }
}

/// Enqueues work for the fan-out task.
#[derive(Debug, Clone)]
pub(crate) struct FanOutHandle {
    requests: mpsc::UnboundedSender<FanOutRequest>,
}

impl FanOutHandle {
    /// Enqueue a broadcast. Never blocks.
    pub(crate) fn broadcast(&self, broadcast: Broadcast) {
        if self.requests.send(FanOutRequest::Broadcast(broadcast)).is_err() {
            debug!("Fan-out closed, broadcast dropped");
        }
    }

    pub(crate) fn subscribe(&self, interest: Interest) -> Subscription {
        let id = SubscriptionId(Uuid::new_v4());
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_CAPACITY);

        if self
            .requests
            .send(FanOutRequest::Subscribe {
                id,
                interest,
                sender,
            })
            .is_err()
        {
            // The sender was dropped with the request,
            // so the subscription just sees the end right away.
            debug!(%id, "Fan-out closed, subscription will be empty");
        }

        Subscription {
            id,
            receiver,
            requests: self.requests.clone(),
        }
    }

    pub(crate) fn close(&self) {
        let _ = self.requests.send(FanOutRequest::Close);
    }
}

struct Subscriber {
    interest: Interest,
    sender: mpsc::Sender<Broadcast>,
}

pub(crate) struct FanOut {
    requests: mpsc::UnboundedReceiver<FanOutRequest>,
    subscribers: HashMap<SubscriptionId, Subscriber>,
}

impl FanOut {
    pub(crate) fn new() -> (Self, FanOutHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();

        (
            Self {
                requests: receiver,
                subscribers: HashMap::new(),
            },
            FanOutHandle { requests: sender },
        )
    }

    pub(crate) async fn run(mut self) {
        while let Some(request) = self.requests.recv().await {
            match request {
                FanOutRequest::Broadcast(broadcast) => self.deliver(broadcast),
                FanOutRequest::Subscribe {
                    id,
                    interest,
                    sender,
                } => {
                    debug!(%id, ?interest, "Observer subscribed");
                    self.subscribers.insert(id, Subscriber { interest, sender });
                }
                FanOutRequest::Unsubscribe(id) => {
                    if self.subscribers.remove(&id).is_some() {
                        debug!(%id, "Observer unsubscribed");
                    }
                }
                FanOutRequest::Close => {
                    debug!("Closing");
                    break;
                }
            }
        }

        debug!("Fan-out stopped");
    }

    fn deliver(&mut self, broadcast: Broadcast) {
        let mut delivered = 0;

        self.subscribers.retain(|id, subscriber| {
            if !subscriber.interest.wants(&broadcast) {
                return true;
            }

            match subscriber.sender.try_send(broadcast.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(%id, "Observer is not keeping up, broadcast dropped for it");
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(%id, "Observer went away without unsubscribing, removing it");
                    false
                }
            }
        });

        trace!("Delivered to {delivered} observer(s)");
    }
}
