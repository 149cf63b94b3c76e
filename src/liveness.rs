//! Liveness supervisor (C7): two independent periodic sweeps that close
//! out sessions the protocol itself will never explicitly close.
//!
//! Heartbeat timeout catches a station that vanished without a TCP close.
//! Ghost-zero-power catches a transaction still open on a connector that
//! stopped delivering current, which on-site experience shows happens
//! far more often than a clean StopTransaction.

use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::transaction::FinalizeReason;
use crate::state::AppState;
use crate::support::shutdown::ShutdownSignal;

const HEARTBEAT_SWEEP_PERIOD: Duration = Duration::from_secs(10);
const HEARTBEAT_TIMEOUT: chrono::Duration = chrono::Duration::seconds(60);

const GHOST_POWER_SWEEP_PERIOD: Duration = Duration::from_secs(5);
const GHOST_POWER_TIMEOUT: chrono::Duration = chrono::Duration::seconds(30);

pub fn spawn_sweeps(state: AppState, shutdown: ShutdownSignal) {
    tokio::spawn(heartbeat_sweep(state.clone(), shutdown.clone()));
    tokio::spawn(ghost_power_sweep(state, shutdown));
}

async fn heartbeat_sweep(state: AppState, shutdown: ShutdownSignal) {
    let mut interval = tokio::time::interval(HEARTBEAT_SWEEP_PERIOD);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let cutoff = Utc::now() - HEARTBEAT_TIMEOUT;
                for station_id in state.stations.stale_online_stations(cutoff) {
                    warn!(station_id, "heartbeat timeout, marking offline");
                    state.stations.mark_offline(&station_id);
                    state.activity_log.record(format!("{station_id} timed out (no heartbeat)"));
                    finalize_station_sessions(&state, &station_id, FinalizeReason::HeartbeatTimeout).await;
                }
            }
            _ = shutdown.notified().wait() => {
                info!("heartbeat sweep shutting down");
                break;
            }
        }
    }
}

async fn ghost_power_sweep(state: AppState, shutdown: ShutdownSignal) {
    let mut interval = tokio::time::interval(GHOST_POWER_SWEEP_PERIOD);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let cutoff = Utc::now() - GHOST_POWER_TIMEOUT;
                let ghosts: Vec<String> = state
                    .transactions
                    .snapshot_active()
                    .into_iter()
                    .filter(|tx| tx.last_nonzero_power_at.map(|t| t < cutoff).unwrap_or(false))
                    .map(|tx| tx.id)
                    .collect();

                for tx_id in ghosts {
                    if let Some(completed) = state.transactions.finalize(&tx_id, FinalizeReason::GhostZeroPower, Utc::now(), None) {
                        warn!(transaction_id = %tx_id, station_id = %completed.station_id, "ghost zero-power transaction finalized");
                        state
                            .activity_log
                            .record(format!("{} session {tx_id} closed (zero power)", completed.station_id));
                        state.spawn_bridge_action(
                            "updateSession",
                            serde_json::json!({
                                "station_id": completed.station_id,
                                "transaction_id": tx_id,
                                "energy": completed.energy,
                                "reason": completed.reason.as_str(),
                            }),
                        );
                    }
                }
            }
            _ = shutdown.notified().wait() => {
                info!("ghost-power sweep shutting down");
                break;
            }
        }
    }
}

async fn finalize_station_sessions(state: &AppState, station_id: &str, reason: FinalizeReason) {
    let now = Utc::now();
    for tx in state.transactions.active_for_station(station_id) {
        if let Some(completed) = state.transactions.finalize(&tx.id, reason, now, None) {
            state.spawn_bridge_action(
                "updateSession",
                serde_json::json!({
                    "station_id": station_id,
                    "transaction_id": completed.id,
                    "energy": completed.energy,
                    "reason": completed.reason.as_str(),
                }),
            );
        }
    }
}
