use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::Level;

use crate::{
    actions::{Action, Response, ResponseResult},
    command::Command,
    config::Config,
    state::DeviceState,
};

/// The command line interface for semaforo.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a configuration file
    pub config: Option<PathBuf>,

    /// The device's serial port, overrides the configuration
    #[arg(long)]
    pub serial: Option<String>,

    /// Baud rate, overrides the configuration
    #[arg(long)]
    pub baud: Option<u32>,

    /// HTTP port, overrides the configuration
    #[arg(long)]
    pub port: Option<u16>,

    /// Heartbeat period in milliseconds, overrides the configuration
    #[arg(long)]
    pub heartbeat_ms: Option<u64>,

    /// Use an in-memory device instead of a serial port
    #[arg(long)]
    pub mock: bool,

    /// Log level on stdout, unless `RUST_LOG` is set
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Also log to daily rotated files in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Apply any overrides given on the command line.
    pub fn apply(&self, config: &mut Config) {
        if let Some(serial) = &self.serial {
            config.serial.path = serial.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud = baud;
        }
        if let Some(port) = self.port {
            config.http_port = port;
        }
        if let Some(heartbeat_ms) = self.heartbeat_ms {
            config.heartbeat_ms = heartbeat_ms;
        }
    }
}

/// Commands available in the command line interface.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Examples for user convenience.
    #[clap(subcommand)]
    Examples(Examples),
}

/// Helpful examples for users.
#[derive(Debug, Subcommand, Clone)]
pub enum Examples {
    /// Show an example of a configuration file's contents.
    Config,

    /// Show an example JSON state, as served on `/state`.
    State,

    /// Show an example JSON request of sending a command.
    Command,

    /// Show an example JSON request of sending free text.
    Intent,

    /// Show an example JSON response (from server to user) of a state broadcast.
    StateUpdate,

    /// Show an example JSON response (from server to user) of a line from the device.
    Line,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Could not serialize example: {e}"),
    }
}

/// Run a subcommand.
pub fn handle_command(command: Commands) {
    match command {
        Commands::Examples(example) => match example {
            Examples::Config => println!("{}", Config::example().serialize_pretty()),
            Examples::State => print_json(&serde_json::json!({ "state": DeviceState::example() })),
            Examples::Command => print_json(&Action::Command(Command::example())),
            Examples::Intent => print_json(&Action::example_intent()),
            Examples::StateUpdate => {
                let example: ResponseResult = Ok(Response::example_state_update());
                print_json(&example)
            }
            Examples::Line => {
                let example: ResponseResult = Ok(Response::example_line());
                print_json(&example)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides() {
        let cli = Cli::try_parse_from([
            "semaforo",
            "my-config.ron",
            "--serial",
            "COM5",
            "--baud",
            "115200",
            "--port",
            "4000",
            "--heartbeat-ms",
            "100",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("my-config.ron")));

        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.serial.path, "COM5");
        assert_eq!(config.serial.baud, 115200);
        assert_eq!(config.http_port, 4000);
        assert_eq!(config.heartbeat_ms, 100);
    }

    #[test]
    fn no_overrides_keeps_config() {
        let cli = Cli::try_parse_from(["semaforo", "--mock", "--log-level", "debug"]).unwrap();

        assert!(cli.mock);
        assert_eq!(cli.log_level, Level::DEBUG);

        let mut config = Config::example();
        cli.apply(&mut config);
        assert_eq!(config, Config::example());
    }

    #[test]
    fn examples_subcommand() {
        let cli = Cli::try_parse_from(["semaforo", "examples", "state-update"]).unwrap();

        assert!(matches!(
            cli.command,
            Some(Commands::Examples(Examples::StateUpdate))
        ));
    }
}
