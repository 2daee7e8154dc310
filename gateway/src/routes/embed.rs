//! Proxy endpoint: authenticate, rate limit, forward.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use embedgate_common::correlation::generate_correlation_id;
use embedgate_common::{CorrelationId, EmbedRequest, EmbedResponse};

use crate::auth::{bearer_token, KeyRecord};
use crate::error::ApiError;
use crate::limit::Decision;
use crate::state::AppState;
use crate::upstream::UpstreamError;

/// Resolve the bearer credential to a principal record.
pub(crate) async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<KeyRecord, ApiError> {
    let token = bearer_token(headers).map_err(|error| {
        tracing::warn!(%error, "Authentication failed");
        ApiError::Unauthorized
    })?;

    match state.keys.lookup(token).await {
        Some(record) => Ok(record),
        None => {
            let prefix: String = token.chars().take(16).collect();
            tracing::warn!(key_prefix = %prefix, "Invalid API key attempt");
            Err(ApiError::Unauthorized)
        }
    }
}

fn resolve_correlation_id(extension: Option<&Extension<CorrelationId>>) -> String {
    extension
        .map(|Extension(id)| id.0.clone())
        .unwrap_or_else(|| generate_correlation_id("gw"))
}

/// POST /v1/embed - authenticated, rate-limited embedding proxy.
///
/// The request is counted against the principal's limits at admission; an
/// upstream failure afterwards is reported (502/504) but never retried and
/// never un-counted.
pub async fn embed(
    State(state): State<Arc<AppState>>,
    correlation: Option<Extension<CorrelationId>>,
    headers: HeaderMap,
    Json(request): Json<EmbedRequest>,
) -> Result<Json<EmbedResponse>, ApiError> {
    let record = |status: &str| {
        state.metrics.requests_total.with_label_values(&[status]).inc();
    };

    let user = match authenticate(&state, &headers).await {
        Ok(user) => user,
        Err(e) => {
            record("unauthorized");
            return Err(e);
        }
    };

    match state
        .limiter
        .check(&user.user_id, user.per_minute, user.per_hour)
        .await
    {
        Decision::Allowed {
            minute_count,
            hour_count,
        } => {
            tracing::info!(
                user_id = %user.user_id,
                requests_minute = minute_count,
                requests_hour = hour_count,
                "Request authenticated"
            );
        }
        Decision::Denied {
            limit_type,
            limit,
            retry_after,
        } => {
            record("rate_limited");
            return Err(ApiError::RateLimited {
                limit_type,
                limit,
                retry_after,
            });
        }
    }

    let input_text = match request.validated() {
        Ok(text) => text,
        Err(e) => {
            record("validation_error");
            return Err(ApiError::Validation(e));
        }
    };

    let correlation_id = resolve_correlation_id(correlation.as_ref());
    let upstream_request = EmbedRequest { input_text };

    match state.upstream.embed(&upstream_request, &correlation_id).await {
        Ok(response) => {
            record("success");
            tracing::info!(
                user_id = %user.user_id,
                text_length = upstream_request.input_text.chars().count(),
                "Embedding generated"
            );
            Ok(Json(response))
        }
        Err(UpstreamError::Timeout) => {
            record("timeout");
            Err(ApiError::UpstreamTimeout)
        }
        Err(error @ UpstreamError::Unavailable(_)) => {
            record("upstream_error");
            Err(ApiError::UpstreamUnavailable(error.to_string()))
        }
        Err(error @ UpstreamError::BadStatus { .. }) => {
            record("upstream_error");
            Err(ApiError::UpstreamUnavailable(error.to_string()))
        }
    }
}
