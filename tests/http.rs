use color_eyre::Result;
use common::{connect_and_sync, get, receive, start_with_mock, start_without_device};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use semaforo::{
    actions::{Async, Response},
    config::Config,
    endpoint::{Endpoint, EndpointEvent},
};
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn state() -> Result<()> {
    let setup = start_with_mock("http_state").await;

    let response = get(setup.port, "/state").await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await?;
    assert_eq!(
        body,
        json!({
            "state": {
                "red": false,
                "yellow": false,
                "green": false,
                "maintenanceActive": false,
                "buttonPressed": false,
                "legacyLedState": "off",
                "mode": "normal",
            }
        })
    );

    Ok(())
}

#[tokio::test]
async fn state_follows_device() -> Result<()> {
    let setup = start_with_mock("http_follows").await;
    let (mut client, _) = connect_and_sync(setup.port).await?;

    setup.mock.say("MANT_BLINK ON");
    while !matches!(receive(&mut client).await??, Response::Async(Async::State(_))) {}

    let body: Value = get(setup.port, "/state").await?.json().await?;
    assert_eq!(body["state"]["red"], true);
    assert_eq!(body["state"]["yellow"], true);
    assert_eq!(body["state"]["green"], true);

    Ok(())
}

#[tokio::test]
async fn led_on_writes_to_device() -> Result<()> {
    let setup = start_with_mock("http_led_on").await;
    let mut wire = setup.mock.events();

    let response = get(setup.port, "/led-on").await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await?;
    assert_eq!(body["message"], "LED encendido desde HTTP");

    // Not optimistically updated.
    assert_eq!(body["state"]["legacyLedState"], "off");

    assert_eq!(wire.recv().await?, EndpointEvent::ToWire(b"ON".to_vec()));

    Ok(())
}

#[tokio::test]
async fn led_off_without_device() -> Result<()> {
    let (_engine, port) = start_without_device().await;

    let response = get(port, "/led-off").await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = response.json().await?;
    assert_eq!(body, json!("NotConnected"));

    Ok(())
}

#[tokio::test]
async fn version() -> Result<()> {
    let setup = start_with_mock("http_version").await;

    let text = get(setup.port, "/version").await?.text().await?;
    assert!(text.starts_with("Semaforo v"));

    Ok(())
}

#[tokio::test]
async fn config_is_ron() -> Result<()> {
    let setup = start_with_mock("http_config").await;

    let text = get(setup.port, "/config").await?.text().await?;
    assert_eq!(Config::deserialize(&text)?, Config::default());

    Ok(())
}
