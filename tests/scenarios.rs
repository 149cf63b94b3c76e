//! End-to-end protocol scenarios, driven over a real WebSocket
//! connection against the bound router.

mod common;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

async fn call(
    socket: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    message_id: &str,
    action: &str,
    payload: Value,
) -> Value {
    let frame = json!([2, message_id, action, payload]).to_string();
    socket.send(Message::Text(frame.into())).await.unwrap();

    let reply = socket.next().await.unwrap().unwrap();
    let text = reply.into_text().unwrap();
    serde_json::from_str(&text).unwrap()
}

#[tokio::test]
async fn s1_happy_path() {
    let server = common::spawn().await;
    let (mut socket, _) = connect_async(format!("{}/ocpp16/CP01", server.ws_base)).await.unwrap();

    let boot: Value = call(
        &mut socket,
        "m1",
        "BootNotification",
        json!({ "chargePointVendor": "ACME", "chargePointModel": "X", "firmwareVersion": "1.0" }),
    )
    .await;
    assert_eq!(boot[0], 3);
    assert_eq!(boot[2]["status"], "Accepted");
    assert_eq!(boot[2]["interval"], 300);

    let start: Value = call(
        &mut socket,
        "m2",
        "StartTransaction",
        json!({ "connectorId": 3, "idTag": "u", "meterStart": 0, "timestamp": "2025-01-01T00:00:00Z" }),
    )
    .await;
    let tx_id = start[2]["transactionId"].as_i64().unwrap();
    assert_eq!(start[2]["idTagInfo"]["status"], "Accepted");

    call(
        &mut socket,
        "m3",
        "MeterValues",
        json!({
            "connectorId": 3,
            "transactionId": tx_id,
            "meterValue": [{ "sampledValue": [
                { "measurand": "Power.Active.Import", "value": "1500" },
                { "measurand": "Energy.Active.Import.Register", "value": "2400" },
                { "measurand": "Voltage", "phase": "L1-N", "value": "230" },
                { "measurand": "Current.Import", "phase": "L1-N", "value": "6.5" },
            ] }]
        }),
    )
    .await;

    let client = reqwest::Client::new();
    let sessions: Value = client
        .get(format!("{}/api/sessions/CP01", server.http_base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session = &sessions["sessions"][0];
    assert_eq!(session["power"], 1500.0);
    assert_eq!(session["energy"], 2.4);
    assert_eq!(session["voltage"], 230.0);
    assert_eq!(session["current"], 6.5);

    let stop: Value = call(
        &mut socket,
        "m4",
        "StopTransaction",
        json!({ "transactionId": tx_id, "meterStop": 3600, "timestamp": "2025-01-01T01:00:00Z" }),
    )
    .await;
    assert_eq!(stop[2]["idTagInfo"]["status"], "Accepted");

    let status: Value = client
        .get(format!("{}/api/sessions/CP01", server.http_base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(status["sessions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn s2_auto_recovery() {
    let server = common::spawn().await;
    let (mut socket, _) = connect_async(format!("{}/ocpp16/CP02", server.ws_base)).await.unwrap();

    let reply = call(
        &mut socket,
        "m1",
        "MeterValues",
        json!({
            "connectorId": 1,
            "meterValue": [{ "sampledValue": [{ "measurand": "Power.Active.Import", "value": "800" }] }]
        }),
    )
    .await;
    assert_eq!(reply[2], json!({}));

    let client = reqwest::Client::new();
    let sessions: Value = client
        .get(format!("{}/api/sessions/CP02", server.http_base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session = &sessions["sessions"][0];
    assert!(session["transaction_id"].as_str().unwrap().starts_with("auto-"));
    assert_eq!(session["connector_id"], 1);
    assert_eq!(session["power"], 800.0);
}

#[tokio::test]
async fn s5_disconnect_cleanup() {
    let server = common::spawn().await;
    let (mut socket, _) = connect_async(format!("{}/ocpp16/CP04", server.ws_base)).await.unwrap();

    call(&mut socket, "m1", "StartTransaction", json!({ "connectorId": 1 })).await;
    call(&mut socket, "m2", "StartTransaction", json!({ "connectorId": 2 })).await;

    socket.close(None).await.unwrap();
    // Give the server's receive loop a moment to observe the close and run cleanup.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let client = reqwest::Client::new();
    let sessions: Value = client
        .get(format!("{}/api/sessions/CP04", server.http_base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(sessions["sessions"].as_array().unwrap().is_empty());

    let devices: Value = client
        .get(format!("{}/api/devices", server.http_base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let cp04 = devices["devices"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["id"] == "CP04")
        .unwrap();
    assert_eq!(cp04["status"], "offline");

    let command_status = client
        .post(format!("{}/command", server.http_base))
        .json(&json!({ "station_id": "CP04", "action": "Reset", "payload": {} }))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(command_status, reqwest::StatusCode::NOT_FOUND);
}
