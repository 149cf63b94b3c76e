//! Shared application state, cloned into every connection task and HTTP
//! handler behind `Arc` (via Axum's `State` extractor).

use std::sync::Arc;

use crate::bridge::{self, BridgeClient, TelemetryFrame};
use crate::domain::{ActivityLog, StationRegistry, TransactionStore};

#[derive(Clone)]
pub struct AppState(Arc<Inner>);

pub struct Inner {
    pub stations: StationRegistry,
    pub transactions: TransactionStore,
    pub activity_log: ActivityLog,
    pub bridge: Box<dyn BridgeClient>,
}

impl std::ops::Deref for AppState {
    type Target = Inner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AppState {
    pub fn new(bridge_url: Option<String>, bridge_secret: Option<String>) -> Self {
        Self(Arc::new(Inner {
            stations: StationRegistry::new(),
            transactions: TransactionStore::new(),
            activity_log: ActivityLog::new(),
            bridge: bridge::from_config(bridge_url, bridge_secret),
        }))
    }

    #[cfg(test)]
    pub fn new_for_test() -> Self {
        Self::new(None, None)
    }

    /// Fire a bridge action off onto its own task (§4.9): the connection
    /// or sweep that triggered it never waits on the outcome.
    pub fn spawn_bridge_action(&self, action: &'static str, data: serde_json::Value) {
        let state = self.clone();
        tokio::spawn(async move { state.bridge.send_action(action, data).await });
    }

    /// Same as [`Self::spawn_bridge_action`] for telemetry frames.
    pub fn spawn_bridge_telemetry(&self, frame: TelemetryFrame) {
        let state = self.clone();
        tokio::spawn(async move { state.bridge.send_telemetry(frame).await });
    }
}
