//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use crate::batcher::Batcher;
use crate::metrics::Metrics;

pub struct AppState {
    pub batcher: Batcher,
    pub metrics: Arc<Metrics>,
    /// Name of the model being served, reported in responses and /health.
    pub model_name: String,
    /// Device the model runs on, reported in /health.
    pub device: String,
    /// Absolute per-request deadline.
    pub request_timeout: Duration,
}
