//! Typed error taxonomy.
//!
//! Distinguishes domain-level failures (peer asked for something that
//! doesn't exist, mostly absorbed into a tolerant protocol reply rather
//! than surfaced) from infrastructure failures (bind failure, outbound
//! bridge transport failure).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Station {0} is not connected")]
    StationOffline(String),
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Bind error: {0}")]
    Bind(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Infra(#[from] InfraError),
}

/// Maps domain/infra failures onto the JSON error shapes of §6: a
/// station lookup miss is a 404, everything else a 500, never a panic
/// on peer-supplied input.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Domain(DomainError::StationOffline(_)) => StatusCode::NOT_FOUND,
            AppError::Infra(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
    }
}
