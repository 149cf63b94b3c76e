//! OCPP 1.6J WebSocket surface: per-station connection handling (C5) and
//! the action dispatch table (C6).

pub mod actions;
pub mod handler;

pub use handler::ocpp_ws_handler;
