//! Read and command HTTP APIs (§6): everything that isn't the OCPP
//! WebSocket upgrade itself.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::state::AppState;
use crate::support::errors::{AppError, DomainError};
use crate::support::ocpp_frame::OcppFrame;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "devices": state.stations.count(),
        "sessions": state.transactions.active_count(),
        "devices_online": state.stations.count_online(),
    }))
}

pub async fn activity(State(state): State<AppState>) -> Json<Value> {
    let entries: Vec<Value> = state
        .activity_log
        .snapshot()
        .into_iter()
        .map(|entry| json!({ "timestamp": entry.timestamp.to_rfc3339(), "message": entry.message }))
        .collect();

    Json(json!({ "success": true, "entries": entries }))
}

pub async fn devices(State(state): State<AppState>) -> Json<Value> {
    let devices: Vec<Value> = state
        .stations
        .snapshot_all()
        .into_iter()
        .map(|station| {
            json!({
                "id": station.id,
                "status": if station.is_online() { "online" } else { "offline" },
                "connected_at": station.connected_at.to_rfc3339(),
                "vendor": station.vendor,
                "model": station.model,
                "firmware_version": station.firmware_version,
                "last_heartbeat": station.last_heartbeat.to_rfc3339(),
            })
        })
        .collect();

    Json(json!({ "success": true, "devices": devices }))
}

pub async fn sessions_all(State(state): State<AppState>) -> Json<Value> {
    Json(sessions_response(state.transactions.snapshot_active()))
}

pub async fn sessions_for_station(State(state): State<AppState>, Path(station_id): Path<String>) -> Json<Value> {
    Json(sessions_response(state.transactions.active_for_station(&station_id)))
}

fn sessions_response(transactions: Vec<crate::domain::Transaction>) -> Value {
    let sessions: Vec<Value> = transactions
        .into_iter()
        .map(|tx| {
            json!({
                "transaction_id": tx.id,
                "station_id": tx.station_id,
                "connector_id": tx.connector_id,
                "start_time": tx.start_time.to_rfc3339(),
                "power": tx.power,
                "energy": tx.energy,
                "voltage": tx.voltage,
                "current": tx.current,
                "temperature": tx.temperature,
            })
        })
        .collect();

    json!({ "success": true, "sessions": sessions })
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub station_id: String,
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

pub async fn send_command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<Value>, AppError> {
    let message_id = Utc::now().timestamp_millis().to_string();
    let frame = OcppFrame::call(message_id.clone(), request.action.clone(), request.payload);

    if !state.stations.send_to(&request.station_id, frame.serialize()) {
        return Err(DomainError::StationOffline(request.station_id).into());
    }

    info!(station_id = %request.station_id, action = %request.action, "command dispatched");
    Ok(Json(json!({ "success": true, "messageId": message_id })))
}
