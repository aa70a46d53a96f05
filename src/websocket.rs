use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, WebSocketUpgrade,
    },
    response::IntoResponse,
    Extension, TypedHeader,
};
use futures::{sink::Sink, stream::Stream, SinkExt, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, info_span, trace, warn, Instrument};

use crate::{
    actions::{Action, Response, ResponseResult},
    broadcast::{Subscription, SUBSCRIBER_CAPACITY},
    command::Command,
    engine::EngineHandle,
    error,
};

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    user_agent: Option<TypedHeader<headers::UserAgent>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(engine): Extension<EngineHandle>,
) -> impl IntoResponse {
    if let Some(TypedHeader(user_agent)) = user_agent {
        info!("`{}`@`{addr}` connected", user_agent.as_str());
    } else {
        info!("`{addr}` connected");
    }

    ws.on_upgrade(move |socket| {
        let span = info_span!("User", %addr);

        handle_websocket(socket, engine).instrument(span)
    })
}

/// Carry out a request.
pub(crate) fn respond(engine: &EngineHandle, action: Action) -> ResponseResult {
    match action {
        Action::Intent(intent) => {
            let command = Command::from_intent(&intent);
            engine.command(&command)?;
            Ok(Response::command_sent(command))
        }
        Action::Command(command) => {
            engine.command(&command)?;
            Ok(Response::command_sent(command))
        }
        Action::GetState => Ok(Response::state(engine.state())),
    }
}

pub(crate) async fn read<S>(
    mut receiver: S,
    sender: mpsc::Sender<ResponseResult>,
    engine: EngineHandle,
) where
    S: Unpin,
    S: Stream<Item = Result<Message, axum::Error>>,
{
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(request_text) => {
                trace!(%request_text, "User request");

                let response = match serde_json::from_str::<Action>(&request_text) {
                    Ok(action) => {
                        debug!(%action, "Request");
                        respond(&engine, action)
                    }
                    Err(e) => Err(error::Error::BadJson {
                        request: request_text,
                        problem: e.to_string(),
                    }),
                };

                if sender.send(response).await.is_err() {
                    debug!("Writer gone");
                    break;
                }
            }
            Message::Binary(_) => {
                debug!("client sent binary data");
            }
            Message::Ping(_) => {
                debug!("socket ping");
            }
            Message::Pong(_) => {
                debug!("socket pong");
            }
            Message::Close(_) => {
                debug!("client disconnected");
            }
        }
    }

    debug!("no more stuff");
}

/// Pass broadcasts on to the writer.
/// If the client does not keep up, broadcasts are dropped instead of queued.
pub(crate) async fn forward(mut subscription: Subscription, sender: mpsc::Sender<ResponseResult>) {
    while let Some(broadcast) = subscription.recv().await {
        match sender.try_send(Ok(broadcast.into())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Client is not keeping up, broadcast dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Writer gone");
                return;
            }
        }
    }

    debug!("Engine closed");
}

pub(crate) async fn write(
    mut sender: impl Sink<Message> + Unpin,
    mut receiver: mpsc::Receiver<ResponseResult>,
) {
    while let Some(response) = receiver.recv().await {
        match &response {
            Ok(r @ Response::Async(_)) => trace!("Response: <{r}>"),
            Ok(r) => debug!("Response: <{r}>"),
            Err(e) => info!("Error response: <{e}>"),
        }

        let response = match serde_json::to_string(&response) {
            Ok(response) => response,
            Err(e) => {
                warn!(%e, "Could not serialize response");
                continue;
            }
        };

        if sender.send(Message::Text(response)).await.is_err() {
            debug!("client disconnected");
            return;
        }
        trace!("Reply flushed");
    }
}

pub(crate) async fn handle_websocket(websocket: WebSocket, engine: EngineHandle) {
    let (stream_sender, stream_receiver) = websocket.split();
    let (response_sender, response_receiver) =
        mpsc::channel::<ResponseResult>(SUBSCRIBER_CAPACITY);

    // Subscribe before reading the state, so nothing happening in between is missed.
    let subscription = engine.subscribe_all();

    if response_sender
        .send(Ok(Response::state(engine.state())))
        .await
        .is_err()
    {
        return;
    }

    let read_handle = tokio::spawn(
        read(stream_receiver, response_sender.clone(), engine).instrument(info_span!("Read")),
    );
    let forward_handle = tokio::spawn(
        forward(subscription, response_sender).instrument(info_span!("Forward")),
    );
    let write_handle = tokio::spawn(
        write(stream_sender, response_receiver).instrument(info_span!("Write")),
    );

    match read_handle.await {
        Ok(()) => debug!("Read task joined"),
        Err(e) => warn!("Read task join error: {e:?}"),
    }

    debug!("Aborting forward and write tasks");
    forward_handle.abort();
    // This ensures the underlying TCP connection gets closed,
    // which signals the peer that the session is over.
    write_handle.abort();
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        actions::{Async, Sync},
        broadcast::{Broadcast, FanOut, Interest, Origin, StateUpdate},
        endpoint::Endpoint,
        engine::EngineBuilder,
        mock::MockBuilder,
        state::DeviceState,
    };

    #[tokio::test]
    async fn intent_becomes_command() {
        let mock = MockBuilder::new("intent").build();
        let engine = EngineBuilder::new().endpoint(mock.clone()).build();
        let mut wire = mock.events();

        let response = respond(&engine.handle(), Action::intent("apagar")).unwrap();

        assert_eq!(response, Response::Sync(Sync::CommandSent(Command::TurnOff)));
        assert_eq!(wire.recv().await.unwrap().as_to_wire().unwrap(), b"OFF");
    }

    #[tokio::test]
    async fn get_state() {
        let engine = EngineBuilder::new().build();

        assert_eq!(
            respond(&engine.handle(), Action::GetState),
            Ok(Response::Sync(Sync::State(DeviceState::default())))
        );
    }

    #[tokio::test]
    async fn command_without_device() {
        let engine = EngineBuilder::new().build();

        assert_eq!(
            respond(&engine.handle(), Action::Command(Command::Cycle)),
            Err(error::Error::NotConnected)
        );
    }

    #[tokio::test]
    async fn slow_client_drops_broadcasts_instead_of_queueing() {
        let (fan_out, handle) = FanOut::new();
        let fan_out = tokio::spawn(fan_out.run());
        let subscription = handle.subscribe(Interest::States);

        let update = |sequence| StateUpdate {
            sequence,
            origin: Origin::Heartbeat,
            state: DeviceState::default(),
        };
        for sequence in 0..3 {
            handle.broadcast(Broadcast::State(update(sequence)));
        }
        handle.close();
        fan_out.await.unwrap();

        // Nobody reads from the writer's side while forwarding.
        let (sender, mut receiver) = mpsc::channel(1);
        forward(subscription, sender).await;

        assert_eq!(
            receiver.recv().await,
            Some(Ok(Response::Async(Async::State(update(0)))))
        );
        assert_eq!(receiver.recv().await, None);
    }
}
