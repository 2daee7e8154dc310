//! HTTP routes for the gateway.

pub mod embed;
pub mod health;
pub mod usage;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/embed", post(embed::embed))
        .route("/v1/usage", get(usage::usage))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(health::metrics))
        .with_state(state)
}
