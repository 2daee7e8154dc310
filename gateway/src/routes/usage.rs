//! Rate-limit usage introspection.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::limit::UsageSnapshot;
use crate::routes::embed::authenticate;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub user_id: String,
    pub usage: UsageSnapshot,
    pub limits: UsageLimits,
}

#[derive(Debug, Serialize)]
pub struct UsageLimits {
    pub per_minute: u32,
    pub per_hour: u32,
}

/// GET /v1/usage - current window counts for the authenticated principal.
///
/// Read-only: this call does not count against the limit.
pub async fn usage(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<UsageResponse>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let usage = state.limiter.usage(&user.user_id).await;

    Ok(Json(UsageResponse {
        user_id: user.user_id,
        usage,
        limits: UsageLimits {
            per_minute: user.per_minute,
            per_hour: user.per_hour,
        },
    }))
}
