#![allow(dead_code)]

use std::time::Duration;

use axum::http::StatusCode;
use color_eyre::{eyre::eyre, Result};
use futures::SinkExt;
use futures::StreamExt;
use semaforo::{
    actions::{self, Response, Sync},
    config::Config,
    engine::{Engine, EngineBuilder},
    mock::{MockBuilder, MockHandle},
    state::DeviceState,
};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::info;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Long enough to never show up in a test unless asked for.
pub const QUIET_HEARTBEAT: Duration = Duration::from_secs(3600);

pub struct Setup {
    pub engine: Engine,
    pub mock: MockHandle,
    pub port: u16,
}

pub async fn start_server(engine: &Engine) -> u16 {
    let (port_tx, port_rx) = oneshot::channel();
    let handle = engine.handle();

    tokio::spawn(async move { semaforo::server::run_any_port(handle, Config::default(), port_tx).await });
    port_rx
        .await
        .expect("Server should reply with allocated port")
}

pub async fn start_with_mock(name: &str) -> Setup {
    start_with_mock_and_heartbeat(name, QUIET_HEARTBEAT).await
}

pub async fn start_with_mock_and_heartbeat(name: &str, heartbeat: Duration) -> Setup {
    let mock = MockBuilder::new(name).build();
    let engine = EngineBuilder::new()
        .heartbeat(heartbeat)
        .endpoint(mock.clone())
        .build();
    let port = start_server(&engine).await;

    Setup { engine, mock, port }
}

pub async fn start_without_device() -> (Engine, u16) {
    let engine = EngineBuilder::new().heartbeat(QUIET_HEARTBEAT).build();
    let port = start_server(&engine).await;

    (engine, port)
}

pub async fn connect(port: u16) -> Result<Client> {
    info!("Connecting to server on port {port}");
    let (stream, http_response) =
        tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/client")).await?;

    assert_eq!(http_response.status(), StatusCode::SWITCHING_PROTOCOLS);

    Ok(stream)
}

/// Connect, and get the state which is always sent first.
pub async fn connect_and_sync(port: u16) -> Result<(Client, DeviceState)> {
    let mut client = connect(port).await?;

    match receive(&mut client).await?? {
        Response::Sync(Sync::State(state)) => Ok((client, state)),
        other => Err(eyre!("Expected the current state first, got {other}")),
    }
}

pub async fn receive(client: &mut Client) -> Result<actions::ResponseResult> {
    let response = timeout(Duration::from_secs(5), client.next())
        .await?
        .ok_or_else(|| eyre!("Stream closed"))??;

    let response = response.to_text()?;
    let response = serde_json::from_str(response)?;

    Ok(response)
}

pub async fn send_receive(client: &mut Client, to_send: String) -> Result<actions::ResponseResult> {
    client.send(tungstenite::Message::Text(to_send)).await?;
    receive(client).await
}

pub async fn get(port: u16, path: &str) -> Result<reqwest::Response> {
    let response = reqwest::get(format!("http://127.0.0.1:{port}{path}")).await?;

    Ok(response)
}
