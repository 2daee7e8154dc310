//! Shared application state.

use std::sync::Arc;

use crate::auth::ApiKeyStore;
use crate::limit::RateLimiter;
use crate::metrics::Metrics;
use crate::upstream::InferenceClient;

pub struct AppState {
    pub keys: ApiKeyStore,
    pub limiter: Arc<dyn RateLimiter>,
    pub upstream: InferenceClient,
    pub metrics: Arc<Metrics>,
}
