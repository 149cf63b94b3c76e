//! Transaction state machine (C6): one function per OCPP 1.6 action,
//! dispatched by name. Every reply is best-effort JSON; we never send a
//! CALLERROR for an unrecognized action (§7).

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::bridge::TelemetryFrame;
use crate::domain::meter::{parse_meter_values, MeterValue};
use crate::domain::transaction::FinalizeReason;
use crate::state::AppState;

/// Route an OCPP 1.6 action by name to its handler. Unknown actions
/// (including CS→CP actions arriving backwards) get an empty result,
/// never a protocol error.
pub async fn dispatch(state: &AppState, station_id: &str, action: &str, payload: &Value) -> Value {
    match action {
        "BootNotification" => handle_boot_notification(state, station_id, payload).await,
        "Heartbeat" => handle_heartbeat(state, station_id).await,
        "StatusNotification" => handle_status_notification(state, station_id, payload).await,
        "StartTransaction" => handle_start_transaction(state, station_id, payload).await,
        "StopTransaction" => handle_stop_transaction(state, station_id, payload).await,
        "MeterValues" => handle_meter_values(state, station_id, payload).await,

        unknown => {
            if is_cs_to_cp_action(unknown) {
                warn!(station_id, action = unknown, "received a CS->CP action from a station");
            } else {
                warn!(station_id, action = unknown, "unrecognized OCPP action, replying empty");
            }
            json!({})
        }
    }
}

async fn handle_boot_notification(state: &AppState, station_id: &str, payload: &Value) -> Value {
    let vendor = payload["chargePointVendor"].as_str().unwrap_or("Unknown");
    let model = payload["chargePointModel"].as_str().unwrap_or("Unknown");
    let firmware = payload["firmwareVersion"].as_str().unwrap_or("Unknown");

    let now = Utc::now();
    state.stations.update_boot(station_id, vendor, model, firmware, now);
    state.activity_log.record(format!("{station_id} booted ({vendor} {model})"));

    state.spawn_bridge_action(
        "registerStation",
        json!({ "station_id": station_id, "vendor": vendor, "model": model, "firmware": firmware }),
    );

    json!({
        "status": "Accepted",
        "currentTime": now.to_rfc3339(),
        "interval": 300,
    })
}

async fn handle_heartbeat(state: &AppState, station_id: &str) -> Value {
    let now = Utc::now();
    state.stations.touch(station_id, now);

    state.spawn_bridge_action(
        "updateStation",
        json!({ "station_id": station_id, "heartbeat_at": now.to_rfc3339() }),
    );

    json!({ "currentTime": now.to_rfc3339() })
}

async fn handle_status_notification(state: &AppState, station_id: &str, payload: &Value) -> Value {
    let status = payload["status"].as_str().unwrap_or("");
    let bridge_state = map_status_to_bridge_state(status);

    info!(station_id, status, bridge_state, "StatusNotification");

    state.spawn_bridge_action(
        "updateStation",
        json!({ "station_id": station_id, "connector_state": bridge_state }),
    );

    json!({})
}

fn map_status_to_bridge_state(status: &str) -> &'static str {
    match status {
        "Available" => "available",
        "Charging" => "charging",
        "Faulted" => "error",
        "Unavailable" => "offline",
        _ => "offline",
    }
}

async fn handle_start_transaction(state: &AppState, station_id: &str, payload: &Value) -> Value {
    let connector_id = payload["connectorId"].as_u64().unwrap_or(0) as u32;
    let tx_id = state.transactions.next_transaction_id();

    state.transactions.open(tx_id.clone(), station_id.to_string(), connector_id, Utc::now());
    state
        .activity_log
        .record(format!("{station_id} started transaction {tx_id} on connector {connector_id}"));

    state.spawn_bridge_action(
        "createSession",
        json!({ "station_id": station_id, "connector_id": connector_id, "transaction_id": tx_id }),
    );

    json!({
        "transactionId": tx_id.parse::<i64>().unwrap_or(0),
        "idTagInfo": { "status": "Accepted" },
    })
}

async fn handle_stop_transaction(state: &AppState, station_id: &str, payload: &Value) -> Value {
    let tx_id = payload["transactionId"]
        .as_i64()
        .map(|n| n.to_string())
        .unwrap_or_default();
    let meter_stop = payload["meterStop"].as_f64().unwrap_or(0.0);

    if let Some(completed) = state
        .transactions
        .finalize(&tx_id, FinalizeReason::Stop, Utc::now(), Some(meter_stop / 1000.0))
    {
        state.activity_log.record(format!(
            "{station_id} stopped transaction {tx_id} ({:.2} kWh)",
            completed.energy
        ));
        state.spawn_bridge_action(
            "updateSession",
            json!({ "station_id": station_id, "transaction_id": tx_id, "energy": completed.energy, "reason": completed.reason.as_str() }),
        );
    }
    // If the transaction was already finalized by a sweep, we still reply
    // Accepted: the station must not be punished for a race it cannot avoid.

    json!({ "idTagInfo": { "status": "Accepted" } })
}

async fn handle_meter_values(state: &AppState, station_id: &str, payload: &Value) -> Value {
    let connector_id = payload["connectorId"].as_u64().unwrap_or(0) as u32;
    let transaction_id = payload["transactionId"].as_i64().map(|n| n.to_string());

    let meter_values: Vec<MeterValue> =
        serde_json::from_value(payload["meterValue"].clone()).unwrap_or_default();

    let tx_id = resolve_or_recover_transaction(state, station_id, connector_id, transaction_id, &meter_values);

    let Some(tx_id) = tx_id else {
        return json!({});
    };

    let reading = parse_meter_values(&meter_values);
    state.transactions.update_meter(&tx_id, reading, Utc::now());

    state.spawn_bridge_telemetry(TelemetryFrame {
        station_id: station_id.to_string(),
        connector_id,
        energy: reading.energy,
        power: reading.power,
    });

    json!({})
}

/// Resolve the target transaction for an inbound MeterValues frame:
/// by transaction id if present and known, else by (station, connector),
/// else synthesize an auto-recovered session (§4.6).
fn resolve_or_recover_transaction(
    state: &AppState,
    station_id: &str,
    connector_id: u32,
    transaction_id: Option<String>,
    meter_values: &[MeterValue],
) -> Option<String> {
    if let Some(tx_id) = &transaction_id {
        if state.transactions.find_by_tx(tx_id).is_some() {
            return Some(tx_id.clone());
        }
    }

    if let Some(tx) = state.transactions.find_by_connector(station_id, connector_id) {
        return Some(tx.id);
    }

    if meter_values.is_empty() {
        return None;
    }

    let auto_id = format!("auto-{}", Utc::now().timestamp_millis());
    state
        .transactions
        .open(auto_id.clone(), station_id.to_string(), connector_id, Utc::now());
    state
        .activity_log
        .record(format!("{station_id} auto-recovered session {auto_id} on connector {connector_id}"));
    Some(auto_id)
}

fn is_cs_to_cp_action(action: &str) -> bool {
    matches!(
        action,
        "CancelReservation"
            | "ChangeAvailability"
            | "ChangeConfiguration"
            | "ClearCache"
            | "ClearChargingProfile"
            | "GetCompositeSchedule"
            | "GetConfiguration"
            | "GetDiagnostics"
            | "GetLocalListVersion"
            | "RemoteStartTransaction"
            | "RemoteStopTransaction"
            | "ReserveNow"
            | "Reset"
            | "SendLocalList"
            | "SetChargingProfile"
            | "TriggerMessage"
            | "UnlockConnector"
            | "UpdateFirmware"
    )
}
