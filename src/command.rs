use std::{convert::Infallible, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::serial::SerialMessageBytes;

/// Things an observer may ask the device to do.
///
/// Sending a command never changes the known state.
/// The device reports back with its own status lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Turn the device on.
    TurnOn,

    /// Turn the device off.
    TurnOff,

    /// Light red.
    SetRed,

    /// Light yellow.
    SetYellow,

    /// Light green.
    SetGreen,

    /// Run the automatic red/yellow/green cycle.
    Cycle,

    /// Switch between normal and maintenance mode.
    ToggleMode,

    /// Send this text as is (upper-cased, on a single line).
    Raw(String),
}

impl Command {
    /// The line the device expects, without the line terminator.
    pub fn line(&self) -> String {
        match self {
            Command::TurnOn => "ON".into(),
            Command::TurnOff => "OFF".into(),
            Command::SetRed => "ROJO".into(),
            Command::SetYellow => "AMARILLO".into(),
            Command::SetGreen => "VERDE".into(),
            Command::Cycle => "CICLO".into(),
            Command::ToggleMode => "TOGGLE_MODE".into(),
            Command::Raw(text) => text
                .chars()
                .filter(|c| !matches!(c, '\r' | '\n'))
                .collect::<String>()
                .trim()
                .to_uppercase(),
        }
    }

    /// The exact bytes to put on the wire, newline terminated.
    pub fn encode(&self) -> SerialMessageBytes {
        let mut line = self.line().into_bytes();
        line.push(b'\n');
        line
    }

    /// Interpret a free-text intent, such as the ones sent by the UI.
    ///
    /// Never fails: unknown words are passed through as [`Command::Raw`].
    pub fn from_intent(intent: &str) -> Self {
        let intent = intent.trim().to_uppercase();

        match intent.as_str() {
            "ON" => Command::TurnOn,
            "OFF" | "APAGAR" => Command::TurnOff,
            "ROJO" => Command::SetRed,
            "AMARILLO" => Command::SetYellow,
            "VERDE" => Command::SetGreen,
            "CICLO" => Command::Cycle,
            "TOGGLE_MODE" => Command::ToggleMode,
            _ => Command::Raw(intent),
        }
    }

    /// An example of a command.
    pub fn example() -> Self {
        Self::SetRed
    }
}

impl FromStr for Command {
    type Err = Infallible;

    fn from_str(intent: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_intent(intent))
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.line())
    }
}
