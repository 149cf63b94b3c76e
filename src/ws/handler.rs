//! Per-station WebSocket connection handler (C5).
//!
//! One task owns the socket and drains frames from an `mpsc` channel back
//! out to it, so every outbound write (a CALLRESULT reply, a sweep's
//! forced disconnect) goes through a single writer and stays in order.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::transaction::FinalizeReason;
use crate::state::AppState;
use crate::support::ocpp_frame::OcppFrame;
use crate::ws::actions;

/// The literal segment `ocpp16` is the router's path prefix, not a
/// station identity; a peer connecting to `/ocpp16/ocpp16` or
/// `/ocpp16/` has not named a real station.
fn is_valid_station_id(station_id: &str) -> bool {
    !station_id.is_empty() && station_id != "ocpp16"
}

pub async fn ocpp_ws_handler(
    ws: WebSocketUpgrade,
    Path(station_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    if !is_valid_station_id(&station_id) {
        warn!(station_id, "rejecting connection with invalid station id");
        return StatusCode::BAD_REQUEST.into_response();
    }

    ws.on_upgrade(move |socket| handle_connection(socket, station_id, state)).into_response()
}

async fn handle_connection(socket: WebSocket, station_id: String, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    state.stations.register(&station_id, outbound_tx, Utc::now());
    state.activity_log.record(format!("{station_id} connected"));
    info!(station_id, "station connected");

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                handle_frame(&state, &station_id, &text).await;
            }
            Ok(Message::Close(_)) => {
                debug!(station_id, "station sent close frame");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Binary(_)) => {
                warn!(station_id, "ignoring unexpected binary frame");
            }
            Err(error) => {
                warn!(station_id, %error, "websocket read error");
                break;
            }
        }
    }

    writer.abort();
    disconnect(&state, &station_id).await;
}

async fn handle_frame(state: &AppState, station_id: &str, text: &str) {
    let frame = match OcppFrame::parse(text) {
        Ok(frame) => frame,
        Err(error) => {
            warn!(station_id, %error, "dropping malformed OCPP frame");
            return;
        }
    };

    let OcppFrame::Call { unique_id, action, payload } = frame else {
        debug!(station_id, "ignoring non-CALL frame from station");
        return;
    };

    let result = actions::dispatch(state, station_id, &action, &payload).await;
    let reply = OcppFrame::reply(unique_id, result);

    if !state.stations.send_to(station_id, reply.serialize()) {
        warn!(station_id, "station went offline before reply could be sent");
    }
}

/// Mark the station offline and finalize every transaction still open on
/// it, so a dropped connection never leaves a session silently running.
async fn disconnect(state: &AppState, station_id: &str) {
    state.stations.mark_offline(station_id);
    state.activity_log.record(format!("{station_id} disconnected"));
    info!(station_id, "station disconnected");

    let now = Utc::now();
    for tx in state.transactions.active_for_station(station_id) {
        if let Some(completed) = state.transactions.finalize(&tx.id, FinalizeReason::Disconnect, now, None) {
            state
                .activity_log
                .record(format!("{station_id} session {} closed on disconnect", completed.id));

            let state = state.clone();
            let station_id = station_id.to_string();
            tokio::spawn(async move {
                state
                    .bridge
                    .send_action(
                        "updateSession",
                        serde_json::json!({
                            "station_id": station_id,
                            "transaction_id": completed.id,
                            "energy": completed.energy,
                            "reason": completed.reason.as_str(),
                        }),
                    )
                    .await;
            });
        }
    }
}
