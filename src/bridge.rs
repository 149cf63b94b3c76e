//! Outbound bridge client (C9): fire-and-forget webhook mirroring
//! lifecycle and telemetry events to an external record-keeping service.
//!
//! `BridgeClient` is a trait so call sites never branch on whether a
//! bridge is actually configured: `NullBridge` is a no-op, `HttpBridge`
//! does the real POST. Every call spawns its own task and swallows
//! failures into a log line — local state is always authoritative.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub struct ActionEnvelope<'a, T: Serialize> {
    pub action: &'a str,
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct TelemetryFrame {
    pub station_id: String,
    pub connector_id: u32,
    pub energy: f64,
    pub power: f64,
}

// `data` is pre-serialized to `serde_json::Value` by the caller (rather
// than a generic parameter) so the trait stays object-safe: call sites
// hold a `Box<dyn BridgeClient>` shared across every connection task.
// Every argument here is owned rather than borrowed so a call site can
// move it straight into a `tokio::spawn`ed task (§4.9: bridge calls are
// fire-and-forget and must never hold up the connection they came from).
#[async_trait]
pub trait BridgeClient: Send + Sync {
    async fn send_action(&self, action: &'static str, data: serde_json::Value);
    async fn send_telemetry(&self, frame: TelemetryFrame);
}

/// No bridge configured: every call is a no-op.
pub struct NullBridge;

#[async_trait]
impl BridgeClient for NullBridge {
    async fn send_action(&self, _action: &'static str, _data: serde_json::Value) {}
    async fn send_telemetry(&self, _frame: TelemetryFrame) {}
}

/// Configured bridge: POSTs JSON to `BRIDGE_URL` with the shared-secret
/// header, fire-and-forget, bounded by `REQUEST_TIMEOUT`.
pub struct HttpBridge {
    client: reqwest::Client,
    url: String,
    secret: Option<String>,
}

impl HttpBridge {
    pub fn new(url: String, secret: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, url, secret }
    }

    async fn post(&self, body: serde_json::Value) {
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(secret) = &self.secret {
            request = request.header("x-bridge-secret", secret);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!(status = %response.status(), "bridge call succeeded");
            }
            Ok(response) => {
                warn!(status = %response.status(), "bridge call returned non-2xx");
            }
            Err(error) => {
                warn!(%error, "bridge call failed");
            }
        }
    }
}

#[async_trait]
impl BridgeClient for HttpBridge {
    async fn send_action(&self, action: &'static str, data: serde_json::Value) {
        let body = match serde_json::to_value(ActionEnvelope { action, data }) {
            Ok(body) => body,
            Err(error) => {
                warn!(%error, "failed to serialize bridge action envelope");
                return;
            }
        };
        self.post(body).await;
    }

    async fn send_telemetry(&self, frame: TelemetryFrame) {
        let body = match serde_json::to_value(&frame) {
            Ok(body) => body,
            Err(error) => {
                warn!(%error, "failed to serialize bridge telemetry frame");
                return;
            }
        };
        self.post(body).await;
    }
}

/// Build the bridge from configuration: a real `HttpBridge` if
/// `BRIDGE_URL` is set, otherwise the no-op.
pub fn from_config(bridge_url: Option<String>, bridge_secret: Option<String>) -> Box<dyn BridgeClient> {
    match bridge_url {
        Some(url) => Box::new(HttpBridge::new(url, bridge_secret)),
        None => Box::new(NullBridge),
    }
}
