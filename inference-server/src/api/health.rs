//! Health and readiness endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::state::AppState;

/// Health response structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub device: String,
    pub queue_size: usize,
    pub inflight_batches: i64,
}

/// GET /health - model status and queue metrics.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model: state.model_name.clone(),
        device: state.device.clone(),
        queue_size: state.batcher.queue_depth(),
        inflight_batches: state.batcher.inflight_batches(),
    })
}

/// GET /ready - readiness check for load balancers.
///
/// The batcher is started before the listener binds, so a served response
/// means the service can accept requests.
pub async fn ready() -> Json<serde_json::Value> {
    Json(json!({"status": "ready"}))
}
