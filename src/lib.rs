#![deny(missing_docs)]

//! Semaforo bridges a traffic-light style indicator board to any number of observers.
//!
//! The board speaks a loose, line based text protocol over a serial port.
//! Each line is normalized, decoded into an [`protocol::Event`] and applied to
//! the single [`state::DeviceState`] owned by the [`engine::Engine`].
//!
//! Observers subscribe through an [`engine::EngineHandle`] and receive
//! every raw line, every resulting state, and a periodic heartbeat of the current state.
//! Commands go the other way, see [`command::Command`].
//!
//! ```no_run
//! # async fn run() {
//! use semaforo::{engine::EngineBuilder, mock::MockBuilder};
//!
//! let device = MockBuilder::new("board").build();
//! let engine = EngineBuilder::new().endpoint(device.clone()).build();
//!
//! let mut states = engine.handle().subscribe();
//! device.say("ROJO ON");
//!
//! let update = states.next_state().await.unwrap();
//! assert!(update.state.red);
//!
//! engine.close().await;
//! # }
//! ```

/// The actions that can be sent from a connecting user,
/// as well as the responses.
pub mod actions;

/// Code relating to setting up the HTTP and websocket server.
pub mod server;

/// The command line interface.
pub mod cli;

/// Handles incoming websockets.
pub(crate) mod websocket;

/// Mocked device.
pub mod mock;

/// Serial port driver.
pub mod serial;

/// Relates to config files.
pub mod config;

/// An endpoint- i.e. something the device is reached through, such as a serial port.
pub mod endpoint;

/// Possible errors in this library.
pub mod error;

/// Logging/tracing setup.
pub mod logging;

/// Understanding what the device says.
pub mod protocol;

/// The device state and its transitions.
pub mod state;

/// Commands for the device.
pub mod command;

/// Delivering engine output to observers.
pub mod broadcast;

/// The engine tying it all together.
pub mod engine;
