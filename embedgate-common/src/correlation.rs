//! Correlation IDs for request tracing across the two tiers.
//!
//! Every request gets a correlation ID: taken from the incoming
//! `X-Correlation-ID` (or `X-Request-ID`) header when a client supplies one,
//! generated otherwise. The ID is stored in request extensions, echoed on
//! the response, and the gateway forwards it on the upstream call so one ID
//! follows a request through both services.

use std::time::Instant;

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
/// Alternative name some clients use.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation ID attached to a request, available via request extensions.
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Generate a new correlation ID with a service prefix, e.g. `gw-1f3a92c40b7d`.
pub fn generate_correlation_id(prefix: &str) -> String {
    let id: u64 = rand::random();
    format!("{}-{:012x}", prefix, id & 0xffff_ffff_ffff)
}

/// Middleware that installs a correlation ID and logs each HTTP request.
///
/// Wire it up with a closure so the service chooses its prefix:
///
/// ```ignore
/// .layer(middleware::from_fn(|req, next| request_logger("gw", req, next)))
/// ```
pub async fn request_logger(prefix: &'static str, mut request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .or_else(|| request.headers().get(REQUEST_ID_HEADER))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| generate_correlation_id(prefix));

    request
        .extensions_mut()
        .insert(CorrelationId(correlation_id.clone()));

    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = %correlation_id,
        "HTTP request"
    );

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(CORRELATION_ID_HEADER), value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::get;
    use axum::{middleware, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(middleware::from_fn(|req, next| {
                request_logger("test", req, next)
            }))
    }

    #[test]
    fn test_generated_id_has_prefix() {
        let id = generate_correlation_id("inf");
        assert!(id.starts_with("inf-"));
        assert_eq!(id.len(), "inf-".len() + 12);
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(generate_correlation_id("gw"), generate_correlation_id("gw"));
    }

    #[tokio::test]
    async fn test_response_carries_generated_id() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let id = response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("correlation header")
            .to_str()
            .unwrap();
        assert!(id.starts_with("test-"));
    }

    #[tokio::test]
    async fn test_incoming_id_is_preserved() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/ping")
                    .header(CORRELATION_ID_HEADER, "client-abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(CORRELATION_ID_HEADER).unwrap(),
            "client-abc123"
        );
    }
}
