//! Error types for the gateway API.

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use embedgate_common::{ErrorBody, RateLimitErrorBody};

pub const RATELIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATELIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Error taxonomy for gateway requests.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid API key")]
    Unauthorized,

    #[error("Rate limit exceeded: {limit} requests per {limit_type}. Retry after {retry_after} seconds.")]
    RateLimited {
        limit_type: String,
        limit: u32,
        retry_after: u64,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] embedgate_common::ValidationError),

    #[error("Inference service error: {0}")]
    UpstreamUnavailable(String),

    #[error("Inference service timeout")]
    UpstreamTimeout,

    #[error("Gateway not ready: {0}")]
    NotReady(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            ApiError::UpstreamTimeout => "TIMEOUT",
            ApiError::NotReady(_) => "NOT_READY",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::RateLimited {
                ref limit_type,
                limit,
                retry_after,
            } => {
                let body = RateLimitErrorBody {
                    error: "Rate limit exceeded".to_string(),
                    detail: Some(self.to_string()),
                    code: self.code().to_string(),
                    retry_after,
                    limit,
                    limit_type: limit_type.clone(),
                };

                let reset_epoch = chrono::Utc::now().timestamp() as u64 + retry_after;
                let mut response =
                    (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                let headers = response.headers_mut();
                headers.insert(header::RETRY_AFTER, header_value(retry_after));
                headers.insert(
                    HeaderName::from_static(RATELIMIT_LIMIT_HEADER),
                    header_value(limit as u64),
                );
                headers.insert(
                    HeaderName::from_static(RATELIMIT_RESET_HEADER),
                    header_value(reset_epoch),
                );
                response
            }
            ApiError::Unauthorized => {
                let body = ErrorBody::new("Unauthorized", self.to_string(), self.code());
                let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Bearer"),
                );
                response
            }
            _ => {
                let status = self.status();
                let body = ErrorBody::new(
                    status.canonical_reason().unwrap_or("error"),
                    self.to_string(),
                    self.code(),
                );
                (status, Json(body)).into_response()
            }
        }
    }
}

fn header_value(value: u64) -> HeaderValue {
    HeaderValue::from_str(&value.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::RateLimited {
                limit_type: "minute".to_string(),
                limit: 60,
                retry_after: 30,
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::UpstreamUnavailable("connection refused".to_string()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(ApiError::UpstreamTimeout.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_rate_limited_response_headers() {
        let error = ApiError::RateLimited {
            limit_type: "minute".to_string(),
            limit: 2,
            retry_after: 58,
        };
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "58");
        assert_eq!(
            response.headers().get(RATELIMIT_LIMIT_HEADER).unwrap(),
            "2"
        );
        assert!(response.headers().contains_key(RATELIMIT_RESET_HEADER));
    }

    #[test]
    fn test_unauthorized_has_www_authenticate() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}
