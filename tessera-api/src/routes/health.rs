//! Health Check Endpoint
//!
//! `GET /health` reports liveness and the number of bound instances.
//! No authentication required.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::state::GatewayState;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub instances: usize,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
}

/// GET /health
pub async fn health(State(state): State<GatewayState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        instances: state.registry.len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    };
    (StatusCode::OK, Json(response))
}
