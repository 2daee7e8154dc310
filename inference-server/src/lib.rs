//! Internal embedding inference server.
//!
//! Coalesces concurrent single-item requests into size/time-bounded batches
//! and runs them on a pool of blocking executor threads.

pub mod api;
pub mod batcher;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod state;

pub use batcher::{Batcher, PredictError};
pub use config::{BatcherConfig, Config, ModelConfig};
pub use metrics::Metrics;
pub use model::{build_models, EmbeddingModel, HashEmbedder, ModelError, SleepModel};
pub use state::AppState;
