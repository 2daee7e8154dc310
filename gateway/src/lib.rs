//! Public API gateway for the embedding service.
//!
//! Authenticates bearer API keys, enforces per-principal sliding-window
//! rate limits over a shared counter store, and proxies admitted requests
//! to the inference service.

pub mod auth;
pub mod config;
pub mod error;
pub mod limit;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod upstream;

pub use auth::{ApiKeyStore, KeyRecord};
pub use config::{Config, RateLimitConfig};
pub use error::ApiError;
pub use limit::{
    create_rate_limiter, CounterStore, Decision, MemoryCounterStore, NoopRateLimiter,
    RateLimiter, RedisCounterStore, SlidingWindowLimiter,
};
pub use metrics::Metrics;
pub use state::AppState;
pub use upstream::InferenceClient;
