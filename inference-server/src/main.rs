//! Inference server - batches embedding requests over a blocking model.

use std::sync::Arc;

use axum::middleware;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use embedgate_common::correlation::request_logger;
use inference_server::{api, build_models, AppState, Batcher, Config, Metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().map_err(|e| format!("Failed to load configuration: {}", e))?;
    tracing::info!(
        model = %config.model.kind,
        dimension = config.model.dimension,
        "Starting inference server"
    );

    let metrics = Arc::new(Metrics::new());

    // One model instance per worker slot; each executor thread takes
    // exclusive ownership of its instance.
    let models = build_models(&config.model, config.batcher.num_workers)
        .map_err(|e| format!("Failed to build model: {}", e))?;
    let model_name = models[0].model_name().to_string();
    let device = models[0].device().to_string();

    let batcher = Batcher::start(&config.batcher, models, metrics.clone());

    let state = Arc::new(AppState {
        batcher,
        metrics,
        model_name,
        device,
        request_timeout: config.request_timeout(),
    });

    let app = api::router(state.clone())
        .layer(middleware::from_fn(|req, next| {
            request_logger("inf", req, next)
        }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain the pipeline once the listener has stopped accepting work.
    match Arc::try_unwrap(state) {
        Ok(state) => state.batcher.shutdown().await,
        Err(_) => tracing::warn!("state still referenced at shutdown, skipping drain"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
