use std::time::Duration;

use color_eyre::Result;
use common::{connect_and_sync, receive, send_receive, start_with_mock, start_without_device};
use pretty_assertions::assert_eq;
use semaforo::{
    actions::{Action, Async, Response, Sync},
    broadcast::Origin,
    command::Command,
    endpoint::{Endpoint, EndpointEvent},
    error::Error,
    state::{DeviceState, Mode},
};

mod common;

#[tokio::test]
async fn can_connect() -> Result<()> {
    let setup = start_with_mock("can_connect").await;
    let (_client, state) = connect_and_sync(setup.port).await?;

    assert_eq!(state, DeviceState::default());

    Ok(())
}

#[tokio::test]
async fn non_json_request_is_bad() -> Result<()> {
    let setup = start_with_mock("non_json").await;
    let (mut client, _) = connect_and_sync(setup.port).await?;

    let response = send_receive(&mut client, "hi".into()).await?;

    assert!(matches!(response, Err(Error::BadJson { .. })));

    Ok(())
}

#[tokio::test]
async fn line_then_state() -> Result<()> {
    let setup = start_with_mock("line_then_state").await;
    let (mut client, _) = connect_and_sync(setup.port).await?;

    setup.mock.say("ROJO ON");

    let response = receive(&mut client).await??;
    assert_eq!(response, Response::Async(Async::Line("ROJO ON".into())));

    let Response::Async(Async::State(update)) = receive(&mut client).await?? else {
        panic!("Expected a state update");
    };
    assert_eq!(update.origin, Origin::Transition);
    assert_eq!(
        update.state,
        DeviceState {
            red: true,
            ..Default::default()
        }
    );

    Ok(())
}

#[tokio::test]
async fn late_joiner_gets_current_state() -> Result<()> {
    let setup = start_with_mock("late_joiner").await;
    let (mut early, _) = connect_and_sync(setup.port).await?;

    setup.mock.say("MODO MANTENIMIENTO");
    setup.mock.say("VERDE ON");

    // Wait until the second state went through.
    let mut states = 0;
    while states < 2 {
        if let Response::Async(Async::State(_)) = receive(&mut early).await?? {
            states += 1;
        }
    }

    let (_late, state) = connect_and_sync(setup.port).await?;

    assert_eq!(
        state,
        DeviceState {
            green: true,
            maintenance_active: true,
            mode: Mode::Maintenance,
            ..Default::default()
        }
    );

    Ok(())
}

#[tokio::test]
async fn intent_is_sent_to_device() -> Result<()> {
    let setup = start_with_mock("intent").await;
    let (mut client, _) = connect_and_sync(setup.port).await?;
    let mut wire = setup.mock.events();

    let response = send_receive(&mut client, Action::intent("Amarillo").serialize()).await??;

    assert_eq!(response, Response::Sync(Sync::CommandSent(Command::SetYellow)));
    assert_eq!(
        wire.recv().await?,
        EndpointEvent::ToWire(b"AMARILLO".to_vec())
    );

    Ok(())
}

#[tokio::test]
async fn command_does_not_change_state() -> Result<()> {
    let setup = start_with_mock("command").await;
    let (mut client, _) = connect_and_sync(setup.port).await?;

    let request = Action::Command(Command::ToggleMode).serialize();
    let response = send_receive(&mut client, request).await??;
    assert_eq!(response, Response::Sync(Sync::CommandSent(Command::ToggleMode)));

    let response = send_receive(&mut client, Action::GetState.serialize()).await??;
    assert_eq!(response, Response::Sync(Sync::State(DeviceState::default())));

    Ok(())
}

#[tokio::test]
async fn command_without_device_is_not_connected() -> Result<()> {
    let (_engine, port) = start_without_device().await;
    let (mut client, _) = connect_and_sync(port).await?;

    let response = send_receive(&mut client, Action::intent("ciclo").serialize()).await?;

    assert_eq!(response, Err(Error::NotConnected));

    Ok(())
}

#[tokio::test]
async fn clients_see_the_same_order() -> Result<()> {
    let setup = start_with_mock("same_order").await;
    let (mut first, _) = connect_and_sync(setup.port).await?;
    let (mut second, _) = connect_and_sync(setup.port).await?;

    let lines = ["ROJO ON", "BOTON PULSADO", "MANT_BLINK ON", "ALL OFF"];
    for line in lines {
        setup.mock.say(line);
    }

    for _ in 0..lines.len() * 2 {
        assert_eq!(receive(&mut first).await??, receive(&mut second).await??);
    }

    Ok(())
}

#[tokio::test]
async fn heartbeat_reaches_clients() -> Result<()> {
    let setup =
        common::start_with_mock_and_heartbeat("heartbeat", Duration::from_millis(50)).await;
    let (mut client, _) = connect_and_sync(setup.port).await?;

    let mut last = None;

    for _ in 0..3 {
        let Response::Async(Async::State(update)) = receive(&mut client).await?? else {
            panic!("Expected a state update");
        };
        assert_eq!(update.origin, Origin::Heartbeat);

        if let Some(last) = last {
            assert!(update.sequence > last);
        }
        last = Some(update.sequence);
    }

    Ok(())
}

#[tokio::test]
async fn closing_the_engine_ends_updates() -> Result<()> {
    let setup = start_with_mock("closing").await;
    let (mut client, _) = connect_and_sync(setup.port).await?;

    setup.engine.close().await;

    // Requests are still answered, but commands are refused.
    let response = send_receive(&mut client, Action::Command(Command::Cycle).serialize()).await?;
    assert_eq!(response, Err(Error::EngineStopped));

    Ok(())
}
