//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::GatewayError;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"healthy"` when the registry answers.
    pub status: String,
    /// RFC 3339 time of the check.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// Live subscriber sessions.
    pub active_connections: usize,
    /// Current global revision of the registry.
    pub global_revision: i64,
    /// Distinct uids known to the registry.
    pub tracked_uids: usize,
}

/// `GET /health`: service health status.
///
/// # Errors
///
/// Returns [`GatewayError::RegistryUnavailable`] (503) if the registry
/// does not answer.
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let stats = state.registry.stats().await?;
    Ok((
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            active_connections: state.connections.active(),
            global_revision: stats.global_revision,
            tracked_uids: stats.tracked_uids,
        }),
    ))
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
