//! API gateway - public entry point for the embedding service.

use std::sync::Arc;

use axum::middleware;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use embedgate_common::correlation::request_logger;
use gateway::{
    create_rate_limiter, routes, ApiKeyStore, AppState, Config, InferenceClient, KeyRecord,
    Metrics,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().map_err(|e| format!("Failed to load configuration: {}", e))?;
    tracing::info!(
        inference_url = %config.inference_url,
        per_minute = config.rate_limit.per_minute,
        per_hour = config.rate_limit.per_hour,
        "Starting API gateway"
    );

    let metrics = Arc::new(Metrics::new());
    let limiter =
        create_rate_limiter(&config.rate_limit, metrics.rate_limit_fallback.clone()).await?;

    let keys = ApiKeyStore::new();
    seed_dev_key(&keys, &config).await;

    let upstream = InferenceClient::new(&config.inference_url, config.request_timeout());

    let state = Arc::new(AppState {
        keys,
        limiter,
        upstream,
        metrics,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state)
        .layer(middleware::from_fn(|req, next| {
            request_logger("gw", req, next)
        }))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Register the development API key: from configuration when provided,
/// generated and logged otherwise. Key issuance is out of scope; this keeps
/// a fresh deployment usable.
async fn seed_dev_key(keys: &ApiKeyStore, config: &Config) {
    let key = match &config.api_key {
        Some(key) => {
            tracing::info!("Using API key from configuration");
            key.clone()
        }
        None => {
            let key = ApiKeyStore::generate_key("sk_dev");
            tracing::warn!(api_key = %key, "Generated development API key - store this securely!");
            key
        }
    };

    keys.insert(
        &key,
        KeyRecord {
            user_id: "dev_user".to_string(),
            name: "Development API Key".to_string(),
            per_minute: config.rate_limit.per_minute,
            per_hour: config.rate_limit.per_hour,
            active: true,
        },
    )
    .await;
}
