use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use semaforo::{
    cli,
    config::Config,
    engine::{Engine, EngineBuilder},
    logging,
    mock::MockBuilder,
    serial::serial_port::SerialPortBuilder,
    server,
};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use tracing::{debug, error, info, warn};

#[cfg(unix)]
async fn hangup() -> std::io::Result<()> {
    signal(SignalKind::hangup())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn hangup() -> std::io::Result<()> {
    std::future::pending().await
}

fn build_engine(cli: &cli::Cli, config: &Config) -> Result<Engine> {
    let builder = EngineBuilder::new().heartbeat(config.heartbeat());

    if cli.mock {
        info!("Using an in-memory device");
        let mock = MockBuilder::new("semaforo").set_loopback(true).build();

        return Ok(builder.endpoint(mock).build());
    }

    let port = SerialPortBuilder::new(&config.serial.path)
        .set_baud(config.serial.baud)
        .set_flow_control(config.serial.flow_control)
        .build();

    match port {
        Ok(port) => Ok(builder.endpoint(port).build()),
        Err(e) if config.start_without_device => {
            warn!(%e, "Continuing without a device");
            Ok(builder.build())
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let mut cli = cli::Cli::parse();

    if let Some(command) = cli.command.take() {
        cli::handle_command(command);

        return Ok(());
    }

    logging::init(
        cli.log_level,
        cli.log_dir.clone().map(|dir| (cli.log_level, dir)),
    )
    .await;

    let mut config = if let Some(config_path) = &cli.config {
        debug!(?config_path, "Config from path");
        Config::new_from_path(config_path)?
    } else {
        debug!("Default config");
        Config::default()
    };
    cli.apply(&mut config);
    config.validate()?;

    let engine = build_engine(&cli, &config)?;
    let port = config.http_port;

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C, quitting");
            Ok(())
        }
        _ = hangup() => {
            info!("Told to hang up, quitting");
            Ok(())
        }
        result = server::run_on_port(engine.handle(), config, port) => {
            error!("Server returned");
            Err(match result {
                Ok(()) => eyre!("Server stopped unexpectedly"),
                Err(e) => e.into(),
            })
        }
    };

    engine.close().await;

    result
}
