//! Liveness and readiness probes.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "ok" or "not_ready: <reason>"
    pub status: String,
    pub service: String,
    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cadets_loaded: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_age: Option<String>,
}

impl HealthStatus {
    pub fn alive() -> Self {
        Self {
            status: "ok".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cadets_loaded: None,
            data_age: None,
        }
    }

    pub fn ready(cadets: usize, age: String) -> Self {
        Self {
            cadets_loaded: Some(cadets),
            data_age: Some(age),
            ..Self::alive()
        }
    }

    pub fn not_ready(reason: &str) -> Self {
        Self {
            status: format!("not_ready: {}", reason),
            ..Self::alive()
        }
    }
}

/// `GET /health/live`: the process is up.
pub async fn health_live() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthStatus::alive()))
}

/// `GET /health/ready`: a leaderboard can be served without waiting on Google.
pub async fn health_ready(State(state): State<AppState>) -> Response {
    match state.cached_leaderboard().await {
        Some((board, age)) => {
            (StatusCode::OK, Json(HealthStatus::ready(board.entries.len(), age))).into_response()
        }
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthStatus::not_ready("leaderboard not loaded yet")),
        )
            .into_response(),
    }
}
