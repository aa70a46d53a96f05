use std::fmt::Display;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::protocol::{Color, Event, Switch};

/// The mode the device is displaying in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    /// Regular operation.
    #[default]
    Normal,

    /// Maintenance operation.
    Maintenance,
}

/// The deprecated single-LED indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LegacyLed {
    /// Lit.
    On,

    /// Not lit.
    #[default]
    Off,
}

impl From<Switch> for LegacyLed {
    fn from(switch: Switch) -> Self {
        match switch {
            Switch::On => Self::On,
            Switch::Off => Self::Off,
        }
    }
}

/// Everything known about the device.
///
/// This is a plain value: every copy is a snapshot,
/// and the engine's live state is never handed out by reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    /// The red light.
    pub red: bool,

    /// The yellow light.
    pub yellow: bool,

    /// The green light.
    pub green: bool,

    /// Sticky. Only changed by maintenance events.
    pub maintenance_active: bool,

    /// Whether the button was last seen pressed.
    pub button_pressed: bool,

    /// The old single-LED indicator.
    pub legacy_led_state: LegacyLed,

    /// Cached from [`DeviceState::maintenance_active`] when a light turns on,
    /// otherwise left as is.
    pub mode: Mode,
}

impl DeviceState {
    /// Apply an event, producing the next state.
    ///
    /// Does not modify `self`. Events with no payload, and [`Event::Unrecognized`],
    /// produce an identical state.
    #[must_use]
    pub fn apply(&self, event: &Event) -> DeviceState {
        let mut next = *self;

        match *event {
            Event::BlinkAll(switch) => next.set_all_colors(switch.is_on()),

            Event::MaintenanceMode(Some(Switch::On)) => {
                next.maintenance_active = true;
                next.mode = Mode::Maintenance;
            }
            Event::MaintenanceMode(Some(Switch::Off)) => {
                next.maintenance_active = false;
                next.mode = Mode::Normal;
                next.set_all_colors(false);
            }

            Event::Button(Some(switch)) => next.button_pressed = switch.is_on(),

            Event::Color(color, Some(Switch::On)) => {
                next.set_all_colors(false);
                *next.color_mut(color) = true;
                next.mode = if next.maintenance_active {
                    Mode::Maintenance
                } else {
                    Mode::Normal
                };
            }
            Event::Color(color, Some(Switch::Off)) => *next.color_mut(color) = false,

            Event::AllOff => next.set_all_colors(false),

            Event::LegacyLed(switch) => next.legacy_led_state = switch.into(),

            Event::MaintenanceMode(None)
            | Event::Button(None)
            | Event::Color(_, None)
            | Event::Unrecognized => {}
        }

        next
    }

    /// Is the given light on?
    pub fn color(&self, color: Color) -> bool {
        match color {
            Color::Red => self.red,
            Color::Yellow => self.yellow,
            Color::Green => self.green,
        }
    }

    fn color_mut(&mut self, color: Color) -> &mut bool {
        match color {
            Color::Red => &mut self.red,
            Color::Yellow => &mut self.yellow,
            Color::Green => &mut self.green,
        }
    }

    fn set_all_colors(&mut self, lit: bool) {
        self.red = lit;
        self.yellow = lit;
        self.green = lit;
    }

    /// An example of a state, with a light on in maintenance mode.
    pub fn example() -> Self {
        Self::default()
            .apply(&Event::MaintenanceMode(Some(Switch::On)))
            .apply(&Event::Color(Color::Yellow, Some(Switch::On)))
    }
}

impl Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = [Color::Red, Color::Yellow, Color::Green]
            .into_iter()
            .filter(|color| self.color(*color))
            .join("+");

        let lit = if lit.is_empty() { "dark".into() } else { lit };

        write!(f, "{lit} ({:?}", self.mode)?;

        if self.maintenance_active {
            write!(f, ", maintenance active")?;
        }
        if self.button_pressed {
            write!(f, ", button pressed")?;
        }

        write!(f, ", led {:?})", self.legacy_led_state)
    }
}
