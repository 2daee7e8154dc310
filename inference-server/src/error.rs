//! Error types for the inference server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use embedgate_common::ErrorBody;

/// Error types for the embedding API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(#[from] embedgate_common::ValidationError),

    #[error("Service overloaded: {0}")]
    Overloaded(String),

    #[error("Request timeout")]
    DeadlineExceeded,

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Service not ready")]
    NotReady,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Overloaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            Error::InferenceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Overloaded(_) => "OVERLOADED",
            Error::DeadlineExceeded => "TIMEOUT",
            Error::InferenceFailed(_) => "INFERENCE_FAILED",
            Error::NotReady => "NOT_READY",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody::new(
            status.canonical_reason().unwrap_or("error"),
            self.to_string(),
            self.code(),
        ));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::Validation(embedgate_common::ValidationError::Empty).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Error::Overloaded("queue full".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(Error::DeadlineExceeded.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            Error::InferenceFailed("shape mismatch".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(Error::NotReady.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_code_strings_are_stable() {
        assert_eq!(Error::DeadlineExceeded.code(), "TIMEOUT");
        assert_eq!(Error::Overloaded(String::new()).code(), "OVERLOADED");
        assert_eq!(
            Error::Validation(embedgate_common::ValidationError::Empty).code(),
            "VALIDATION_ERROR"
        );
    }
}
