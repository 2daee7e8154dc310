//! HTTP client for the inference service.

use std::time::Duration;

use embedgate_common::{EmbedRequest, EmbedResponse, CORRELATION_ID_HEADER};
use reqwest::Client;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors talking to the inference service.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("cannot connect to inference service: {0}")]
    Unavailable(String),
    #[error("inference service timeout")]
    Timeout,
    #[error("inference service returned HTTP {status}: {body}")]
    BadStatus { status: u16, body: String },
}

/// Pooled client for the internal gateway → inference hop.
///
/// No retries at this layer: an admitted request has already been counted
/// against the caller's limit, and retrying during an incident only
/// amplifies load. The client is the retry authority.
pub struct InferenceClient {
    http: Client,
    base_url: String,
}

impl InferenceClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Self {
        Self {
            http: Client::builder()
                .timeout(request_timeout)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Forward an embed request, propagating the correlation ID.
    ///
    /// Cancellation propagates naturally: when the caller goes away the
    /// request future is dropped and the connection to the upstream closes.
    pub async fn embed(
        &self,
        request: &EmbedRequest,
        correlation_id: &str,
    ) -> Result<EmbedResponse, UpstreamError> {
        let url = format!("{}/embed", self.base_url);

        let response = self
            .http
            .post(&url)
            .header(CORRELATION_ID_HEADER, correlation_id)
            .json(request)
            .send()
            .await
            .map_err(classify_request_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status, %body, "Inference service error");
            return Err(UpstreamError::BadStatus { status, body });
        }

        response.json().await.map_err(classify_request_error)
    }

    /// Probe the upstream /health endpoint with a short budget.
    pub async fn health(&self, correlation_id: &str) -> Result<serde_json::Value, UpstreamError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .http
            .get(&url)
            .header(CORRELATION_ID_HEADER, correlation_id)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(classify_request_error)?;

        response.json().await.map_err(classify_request_error)
    }
}

fn classify_request_error(error: reqwest::Error) -> UpstreamError {
    if error.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::Unavailable(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        let client = InferenceClient::new("http://localhost:8001/", Duration::from_secs(5));
        assert_eq!(client.base_url, "http://localhost:8001");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_unavailable() {
        // Nothing listens on this port.
        let client = InferenceClient::new("http://127.0.0.1:9", Duration::from_secs(1));
        let request = EmbedRequest {
            input_text: "hello".to_string(),
        };

        match client.embed(&request, "test-1").await {
            Err(UpstreamError::Unavailable(_)) | Err(UpstreamError::Timeout) => {}
            other => panic!("expected unavailable, got {:?}", other.map(|_| ())),
        }
    }
}
