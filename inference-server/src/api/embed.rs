//! Embedding endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::{Extension, Json};
use embedgate_common::correlation::generate_correlation_id;
use embedgate_common::{CorrelationId, EmbedRequest, EmbedResponse};

use crate::batcher::PredictError;
use crate::error::Error;
use crate::state::AppState;

/// POST /embed - generate an embedding for one input text.
///
/// Requests are coalesced into batches transparently; the handler just
/// offers the item and awaits its completion under the request deadline.
pub async fn embed(
    State(state): State<Arc<AppState>>,
    correlation: Option<Extension<CorrelationId>>,
    Json(request): Json<EmbedRequest>,
) -> Result<Json<EmbedResponse>, Error> {
    let text = request.validated()?;

    let embedding = state
        .batcher
        .predict(text, state.request_timeout)
        .await
        .map_err(|e| match e {
            PredictError::Overloaded => Error::Overloaded("request queue is full".to_string()),
            PredictError::DeadlineExceeded => Error::DeadlineExceeded,
            PredictError::Inference(message) => {
                let correlation_id = correlation
                    .as_ref()
                    .map(|Extension(id)| id.0.clone())
                    .unwrap_or_else(|| generate_correlation_id("inf"));
                tracing::error!(%correlation_id, error = %message, "Embedding generation failed");
                Error::InferenceFailed(message)
            }
            PredictError::ShuttingDown => Error::NotReady,
        })?;

    Ok(Json(EmbedResponse {
        embedding,
        model: state.model_name.clone(),
    }))
}
