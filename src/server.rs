use std::net::SocketAddr;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Extension, Json, Router};
use serde_json::json;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{command::Command, config::Config, engine::EngineHandle, error::Error, websocket};

async fn run(
    engine: EngineHandle,
    config: Config,
    port: Option<u16>,
    allocated_port: Option<oneshot::Sender<u16>>,
) -> Result<(), Error> {
    config.validate()?;

    let app = Router::new()
        .route("/client", get(websocket::ws_handler))
        .route("/state", get(show_state))
        .route("/led-on", get(led_on))
        .route("/led-off", get(led_off))
        .route("/config", get(show_config))
        .route("/version", get(show_version))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // Each websocket and request needs to be able to reach the engine
                .layer(Extension(engine))
                .layer(Extension(config)),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(0)));
    let server = axum::Server::try_bind(&addr)
        .map_err(|e| Error::Server(format!("Could not bind to {addr}: {e}")))?
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());
    let addr = server.local_addr();

    if let Some(port_reply) = allocated_port {
        if port_reply.send(addr.port()).is_err() {
            warn!("Nobody wanted to know which port was allocated");
        }
    }

    info!("listening on {}", addr);

    server.await.map_err(|e| Error::Server(e.to_string()))
}

/// Start the server on an arbitrary available port.
/// The port allocated will be sent on the provided channel.
pub async fn run_any_port(
    engine: EngineHandle,
    config: Config,
    allocated_port: oneshot::Sender<u16>,
) -> Result<(), Error> {
    run(engine, config, None, Some(allocated_port)).await
}

/// Start the server on the given port.
pub async fn run_on_port(engine: EngineHandle, config: Config, port: u16) -> Result<(), Error> {
    run(engine, config, Some(port), None).await
}

async fn show_state(Extension(engine): Extension<EngineHandle>) -> impl IntoResponse {
    Json(json!({ "state": engine.state() }))
}

fn led(engine: &EngineHandle, command: Command, message: &str) -> impl IntoResponse {
    match engine.command(&command) {
        // The device reports back by itself, so this is the state as it was.
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": message, "state": engine.state() })),
        ),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!(e))),
    }
}

async fn led_on(Extension(engine): Extension<EngineHandle>) -> impl IntoResponse {
    led(&engine, Command::TurnOn, "LED encendido desde HTTP")
}

async fn led_off(Extension(engine): Extension<EngineHandle>) -> impl IntoResponse {
    led(&engine, Command::TurnOff, "LED apagado desde HTTP")
}

async fn show_config(Extension(config): Extension<Config>) -> impl IntoResponse {
    config.serialize_pretty()
}

async fn show_version() -> impl IntoResponse {
    format!("Semaforo v{}\n", env!("CARGO_PKG_VERSION"))
}
