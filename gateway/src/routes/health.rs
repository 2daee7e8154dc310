//! Health, readiness and metrics endpoints (unauthenticated).

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use embedgate_common::correlation::generate_correlation_id;
use embedgate_common::CorrelationId;
use serde::Serialize;
use serde_json::json;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub gateway_version: String,
    /// "distributed", "local" or "disabled".
    pub rate_limiting: String,
    pub inference_service: serde_json::Value,
}

/// GET /health - gateway status plus a probe of the inference service.
pub async fn health(
    State(state): State<Arc<AppState>>,
    correlation: Option<Extension<CorrelationId>>,
) -> Json<HealthResponse> {
    let correlation_id = correlation
        .map(|Extension(id)| id.0)
        .unwrap_or_else(|| generate_correlation_id("gw"));

    let inference_service = match state.upstream.health(&correlation_id).await {
        Ok(body) => body,
        Err(error) => {
            tracing::warn!(%error, "Inference service health check failed");
            json!({"status": "unhealthy", "error": error.to_string()})
        }
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        gateway_version: env!("CARGO_PKG_VERSION").to_string(),
        rate_limiting: state.limiter.mode().to_string(),
        inference_service,
    })
}

/// GET /ready - readiness check for load balancers.
pub async fn ready() -> Json<serde_json::Value> {
    Json(json!({"status": "ready"}))
}

/// GET /metrics - Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.encode(),
    )
        .into_response()
}
