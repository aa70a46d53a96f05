/// Turning raw transport lines into canonical, comparable text.
pub mod normalize;

/// Classifying normalized lines into device events.
pub mod decoder;

pub use decoder::{decode, Color, Event, Switch};
pub use normalize::{normalize, NormalizedLine};
