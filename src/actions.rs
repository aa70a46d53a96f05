use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    broadcast::{Broadcast, Origin, StateUpdate},
    command::Command,
    error,
    serial::SerialMessage,
    state::DeviceState,
};

/// Actions a websocket user can ask of the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Free text, as typed into a command box.
    ///
    /// Known words such as `ROJO` or `APAGAR` become their command,
    /// anything else is sent to the device as is.
    Intent(String),

    /// Send this command to the device.
    Command(Command),

    /// Reply with the current state.
    GetState,
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Intent(intent) => write!(f, "intent: {intent}"),
            Action::Command(command) => write!(f, "command: {command}"),
            Action::GetState => write!(f, "get state"),
        }
    }
}

impl Action {
    /// Create an intent action.
    pub fn intent(intent: &str) -> Self {
        Self::Intent(intent.into())
    }

    /// An example of an intent, as sent by the UI.
    pub fn example_intent() -> Self {
        Self::intent("ciclo")
    }

    /// An example of a command action.
    pub fn example_command() -> Self {
        Self::Command(Command::example())
    }

    /// Turn an action into serialized json.
    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A response type of "sync nature"- a direct response to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sync {
    /// This command was handed to the device.
    CommandSent(Command),

    /// The current state.
    State(DeviceState),
}

/// An async response type- might originate on the server side at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Async {
    /// The device sent a line.
    Line(SerialMessage),

    /// A state broadcast.
    State(StateUpdate),
}

/// Responses the server will send to connected users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// A synchronous response in the sense that it's sent directly after a user
    /// request.
    Sync(Sync),

    /// An async message- the server might send this at any time and not in response to any
    /// particular request.
    Async(Async),
}

impl Response {
    pub(crate) fn command_sent(command: Command) -> Self {
        Self::Sync(Sync::CommandSent(command))
    }

    /// An example of a command sent response.
    pub fn example_command_sent() -> Self {
        Self::command_sent(Command::example())
    }

    pub(crate) fn state(state: DeviceState) -> Self {
        Self::Sync(Sync::State(state))
    }

    /// An example of a state response.
    pub fn example_state() -> Self {
        Self::state(DeviceState::example())
    }

    /// An example of a state broadcast. These are async and appear on every transition,
    /// and periodically.
    pub fn example_state_update() -> Self {
        Self::Async(Async::State(StateUpdate {
            sequence: 42,
            origin: Origin::Heartbeat,
            state: DeviceState::example(),
        }))
    }

    /// An example of a raw line from the device.
    pub fn example_line() -> Self {
        Self::Async(Async::Line("MANT_BLINK ON".into()))
    }
}

impl From<Broadcast> for Response {
    fn from(broadcast: Broadcast) -> Self {
        match broadcast {
            Broadcast::Line(line) => Self::Async(Async::Line(line)),
            Broadcast::State(update) => Self::Async(Async::State(update)),
        }
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Response::Sync(Sync::CommandSent(command)) => write!(f, "Command sent: {command}"),
            Response::Sync(Sync::State(state)) => write!(f, "State: {state}"),
            Response::Async(Async::Line(line)) => write!(f, "Line: `{line}`"),
            Response::Async(Async::State(update)) => write!(f, "State update {update}"),
        }
    }
}

/// A fallible response.
pub type ResponseResult = Result<Response, error::Error>;
