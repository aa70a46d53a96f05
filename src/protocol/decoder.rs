//! The device's status lines are free-form and inconsistent between firmware versions.
//! Categories are recognized by phrase containment, payloads by whole words.
//!
//! Since containment is ambiguous (a maintenance line may well mention a color)
//! the categories are tried in a fixed order, see [`RULES`].
//! The first rule producing an event wins.

use std::fmt::Display;

use tracing::trace;

use super::normalize::NormalizedLine;

/// An on/off payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Switch {
    /// On, pressed, active.
    On,

    /// Off, released, inactive.
    Off,
}

impl Switch {
    /// Is this [`Switch::On`]?
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

/// One of the three indicator lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// Red ("ROJO").
    Red,

    /// Yellow ("AMARILLO").
    Yellow,

    /// Green ("VERDE").
    Green,
}

impl Color {
    /// The name the device uses for this color.
    pub fn device_name(self) -> &'static str {
        match self {
            Color::Red => "ROJO",
            Color::Yellow => "AMARILLO",
            Color::Green => "VERDE",
        }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::Red => write!(f, "red"),
            Color::Yellow => write!(f, "yellow"),
            Color::Green => write!(f, "green"),
        }
    }
}

/// A decoded status line.
///
/// Payloads which are `None` mean the category was recognized
/// but neither an affirmative nor a negative word was found.
/// Such events are valid but change nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// All lights blink together. Does not touch the maintenance flag.
    BlinkAll(Switch),

    /// Maintenance mode was entered or left.
    MaintenanceMode(Option<Switch>),

    /// The physical button was pressed ([`Switch::On`]) or released.
    Button(Option<Switch>),

    /// A single light was turned on or off.
    Color(Color, Option<Switch>),

    /// All lights were turned off.
    AllOff,

    /// The old single-LED indicator.
    LegacyLed(Switch),

    /// Nothing known. Still a valid event.
    Unrecognized,
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::BlinkAll(switch) => write!(f, "blink all {switch:?}"),
            Event::MaintenanceMode(switch) => write!(f, "maintenance {switch:?}"),
            Event::Button(switch) => write!(f, "button {switch:?}"),
            Event::Color(color, switch) => write!(f, "{color} {switch:?}"),
            Event::AllOff => write!(f, "all off"),
            Event::LegacyLed(switch) => write!(f, "led {switch:?}"),
            Event::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

const BLINK_MARKERS: &[&str] = &["MANT_BLINK", "MANT BLINK", "MANTENIMIENTO BLINK"];

const MAINTENANCE_MARKER: &str = "MANTENIMIENTO";
const MAINTENANCE_MODE_PHRASE: &str = "MODO MANTENIMIENTO";
const MAINTENANCE_ON: &[&str] = &["ON", "SI", "SÍ", "ACTIVADO", "ACTIVAR"];
const MAINTENANCE_OFF: &[&str] = &["OFF", "NO", "DESACTIVADO", "DESACTIVAR"];

const BUTTON_MARKERS: &[&str] = &[
    "BOTON", "BOTÓN", "BUTTON", "PULSADO", "PRESSED", "LIBRE", "RELEASED",
];
const BUTTON_PRESSED: &[&str] = &["PULSADO", "PRESSED", "1", "ON"];
const BUTTON_RELEASED: &[&str] = &["LIBRE", "RELEASED", "0", "OFF", "NO"];

// Order matters: it decides which color a line mentioning several is about.
const COLORS: [Color; 3] = [Color::Red, Color::Green, Color::Yellow];
const COLOR_ON: &[&str] = &["ON", "ENCENDIDO", "HIGH", "1"];
const COLOR_OFF: &[&str] = &["OFF", "APAGADO", "0", "LOW"];

const ALL_OFF_MARKERS: &[&str] = &["ALL OFF", "ALL_OFF", "ALLOFF", "APAGADO"];

const LED_ON_MARKERS: &[&str] = &["LED ENCENDIDO", "LED ON"];
const LED_OFF_MARKERS: &[&str] = &["LED APAGADO", "LED OFF"];

/// Affirmative words win over negative ones.
fn switch(line: &NormalizedLine, on: &[&str], off: &[&str]) -> Option<Switch> {
    if line.has_token(on) {
        Some(Switch::On)
    } else if line.has_token(off) {
        Some(Switch::Off)
    } else {
        None
    }
}

fn blink_all(line: &NormalizedLine) -> Option<Event> {
    if !line.contains_any(BLINK_MARKERS) {
        return None;
    }

    // Anything but an explicit `ON` stops the blinking.
    let switch = if line.has_token(&["ON"]) {
        Switch::On
    } else {
        Switch::Off
    };

    Some(Event::BlinkAll(switch))
}

fn maintenance_mode(line: &NormalizedLine) -> Option<Event> {
    if !line.contains(MAINTENANCE_MARKER) {
        return None;
    }

    let switch = if line.contains(MAINTENANCE_MODE_PHRASE) {
        Some(Switch::On)
    } else {
        switch(line, MAINTENANCE_ON, MAINTENANCE_OFF)
    };

    Some(Event::MaintenanceMode(switch))
}

fn button(line: &NormalizedLine) -> Option<Event> {
    if !line.contains_any(BUTTON_MARKERS) {
        return None;
    }

    Some(Event::Button(switch(line, BUTTON_PRESSED, BUTTON_RELEASED)))
}

fn color(line: &NormalizedLine) -> Option<Event> {
    let color = COLORS
        .into_iter()
        .find(|color| line.contains(color.device_name()))?;

    Some(Event::Color(color, switch(line, COLOR_ON, COLOR_OFF)))
}

fn all_off(line: &NormalizedLine) -> Option<Event> {
    line.contains_any(ALL_OFF_MARKERS).then_some(Event::AllOff)
}

fn legacy_led(line: &NormalizedLine) -> Option<Event> {
    if line.contains_any(LED_ON_MARKERS) {
        Some(Event::LegacyLed(Switch::On))
    } else if line.contains_any(LED_OFF_MARKERS) {
        Some(Event::LegacyLed(Switch::Off))
    } else {
        None
    }
}

type Rule = fn(&NormalizedLine) -> Option<Event>;

/// The decoding rules, most specific first.
///
/// Blinking is checked before maintenance since `MANTENIMIENTO BLINK`
/// contains the maintenance marker. Maintenance and the button are checked
/// before colors since their lines may contain color names.
pub const RULES: &[(&str, Rule)] = &[
    ("blink-all", blink_all),
    ("maintenance-mode", maintenance_mode),
    ("button", button),
    ("color", color),
    ("all-off", all_off),
    ("legacy-led", legacy_led),
];

/// Decode a normalized line.
///
/// Never fails: text matching no rule is [`Event::Unrecognized`].
pub fn decode(line: &NormalizedLine) -> Event {
    RULES
        .iter()
        .find_map(|(name, rule)| {
            let event = rule(line)?;
            trace!(rule = *name, %event, "Rule matched");
            Some(event)
        })
        .unwrap_or(Event::Unrecognized)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::protocol::normalize;

    fn decode_str(raw: &str) -> Event {
        decode(&normalize(raw).expect("Test lines are not empty"))
    }

    #[test]
    fn blink() {
        assert_eq!(decode_str("MANT_BLINK ON"), Event::BlinkAll(Switch::On));
        assert_eq!(decode_str("mant blink off"), Event::BlinkAll(Switch::Off));
        assert_eq!(
            decode_str("MANTENIMIENTO BLINK ON"),
            Event::BlinkAll(Switch::On)
        );
    }

    #[test]
    fn blink_without_on_is_off() {
        assert_eq!(decode_str("MANT_BLINK"), Event::BlinkAll(Switch::Off));
        assert_eq!(decode_str("MANT_BLINK ONCE"), Event::BlinkAll(Switch::Off));
    }

    #[test]
    fn maintenance() {
        assert_eq!(
            decode_str("MANTENIMIENTO ON"),
            Event::MaintenanceMode(Some(Switch::On))
        );
        assert_eq!(
            decode_str("Mantenimiento activado"),
            Event::MaintenanceMode(Some(Switch::On))
        );
        assert_eq!(
            decode_str("MANTENIMIENTO OFF"),
            Event::MaintenanceMode(Some(Switch::Off))
        );
        assert_eq!(
            decode_str("MODO MANTENIMIENTO"),
            Event::MaintenanceMode(Some(Switch::On))
        );
    }

    #[test]
    fn maintenance_deactivated_is_not_activated() {
        assert_eq!(
            decode_str("MANTENIMIENTO DESACTIVADO"),
            Event::MaintenanceMode(Some(Switch::Off))
        );
    }

    #[test]
    fn bare_maintenance_has_no_payload() {
        assert_eq!(
            decode_str("MANTENIMIENTO"),
            Event::MaintenanceMode(None)
        );
    }

    #[test]
    fn maintenance_wins_over_color() {
        assert_eq!(
            decode_str("MANTENIMIENTO ON (ROJO ON)"),
            Event::MaintenanceMode(Some(Switch::On))
        );
        assert_eq!(
            decode_str("VERDE OFF MANTENIMIENTO OFF"),
            Event::MaintenanceMode(Some(Switch::Off))
        );
    }

    #[test]
    fn button() {
        assert_eq!(decode_str("BOTON PULSADO"), Event::Button(Some(Switch::On)));
        assert_eq!(decode_str("BOTON: 1"), Event::Button(Some(Switch::On)));
        assert_eq!(decode_str("released"), Event::Button(Some(Switch::Off)));
        assert_eq!(decode_str("BOTON 0"), Event::Button(Some(Switch::Off)));
    }

    #[test]
    fn button_word_is_not_on() {
        // `BOTON` contains `ON`, which must not count as pressed.
        assert_eq!(decode_str("BOTON LIBRE"), Event::Button(Some(Switch::Off)));
        assert_eq!(decode_str("BOTON"), Event::Button(None));
    }

    #[test]
    fn colors() {
        assert_eq!(
            decode_str("ROJO ON"),
            Event::Color(Color::Red, Some(Switch::On))
        );
        assert_eq!(
            decode_str("amarillo=HIGH"),
            Event::Color(Color::Yellow, Some(Switch::On))
        );
        assert_eq!(
            decode_str("VERDE 0"),
            Event::Color(Color::Green, Some(Switch::Off))
        );
        assert_eq!(
            decode_str("ROJO APAGADO"),
            Event::Color(Color::Red, Some(Switch::Off))
        );
        assert_eq!(decode_str("VERDE"), Event::Color(Color::Green, None));
    }

    #[test]
    fn red_is_checked_before_other_colors() {
        assert_eq!(
            decode_str("VERDE OFF, ROJO ON"),
            Event::Color(Color::Red, Some(Switch::On))
        );
        assert_eq!(
            decode_str("AMARILLO -> VERDE ON"),
            Event::Color(Color::Green, Some(Switch::On))
        );
    }

    #[test]
    fn all_off() {
        assert_eq!(decode_str("ALL OFF"), Event::AllOff);
        assert_eq!(decode_str("all_off"), Event::AllOff);
        assert_eq!(decode_str("TODO APAGADO"), Event::AllOff);
    }

    #[test]
    fn legacy_led() {
        assert_eq!(decode_str("LED ON"), Event::LegacyLed(Switch::On));
        assert_eq!(decode_str("led encendido"), Event::LegacyLed(Switch::On));
        assert_eq!(decode_str("LED OFF"), Event::LegacyLed(Switch::Off));
    }

    #[test]
    fn led_apagado_is_all_off() {
        // The all-off rule sees `APAGADO` first.
        assert_eq!(decode_str("LED APAGADO"), Event::AllOff);
    }

    #[test]
    fn unrecognized() {
        assert_eq!(decode_str("HOLA MUNDO"), Event::Unrecognized);
        assert_eq!(decode_str("READY"), Event::Unrecognized);
    }

    #[test]
    fn rules_are_each_reachable() {
        let samples = [
            "MANT_BLINK ON",
            "MANTENIMIENTO ON",
            "BOTON PULSADO",
            "ROJO ON",
            "ALL OFF",
            "LED ON",
        ];

        for ((name, rule), sample) in RULES.iter().zip(samples) {
            let line = normalize(sample).unwrap();
            assert!(rule(&line).is_some(), "{name} should match `{sample}`");
            assert_eq!(decode(&line), rule(&line).unwrap());
        }
    }
}
