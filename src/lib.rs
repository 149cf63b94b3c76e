//! # OCPP 1.6J central system
//!
//! A WebSocket/JSON central system for EV charging stations.
//!
//! - **support**: cross-cutting utilities (errors, shutdown, wire framing)
//! - **domain**: station registry, session store, meter-value parsing, activity log
//! - **ws**: OCPP 1.6J connection handling and the per-action dispatch table
//! - **http**: read/command JSON APIs
//! - **bridge**: outbound webhook client mirroring events to an external service
//! - **liveness**: periodic sweeps that close out sessions the protocol never explicitly closes
//! - **config**: environment-driven startup configuration

pub mod bridge;
pub mod config;
pub mod domain;
pub mod http;
pub mod liveness;
pub mod state;
pub mod support;
pub mod ws;

pub use config::Config;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the full HTTP/WebSocket router over a given state. Shared
/// between `main` and the integration tests so routing never drifts
/// between the two.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/ocpp16/{station_id}", get(ws::ocpp_ws_handler))
        .route("/health", get(http::health))
        .route("/api/status", get(http::status))
        .route("/api/devices", get(http::devices))
        .route("/api/activity", get(http::activity))
        .route("/api/sessions", get(http::sessions_all))
        .route("/api/sessions/{station_id}", get(http::sessions_for_station))
        .route("/command", post(http::send_command))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
