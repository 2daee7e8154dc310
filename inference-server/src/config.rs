//! Configuration for the inference server.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the inference server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Which embedding model to serve.
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub batcher: BatcherConfig,
    /// Absolute per-request deadline in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Model kind: "hash" (deterministic feature hashing) or "sleep"
    /// (latency simulator for load testing).
    #[serde(default = "default_model_kind")]
    pub kind: String,
    /// Embedding dimension.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: default_model_kind(),
            dimension: default_dimension(),
        }
    }
}

/// Dynamic batching parameters. Immutable after startup.
#[derive(Debug, Clone, Deserialize)]
pub struct BatcherConfig {
    /// Maximum number of items per batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Maximum wait from the first item of a forming batch to batch closure.
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,
    /// Number of collector tasks draining the queue.
    #[serde(default = "default_num_collectors")]
    pub num_collectors: usize,
    /// Number of executor threads owning a model handle each.
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// Capacity of the ingress queue. Must be >= max_batch_size.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl BatcherConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    /// Reject parameter combinations the batcher cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::Message(
                "batcher.max_batch_size must be >= 1".to_string(),
            ));
        }
        if self.batch_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "batcher.batch_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.num_collectors == 0 {
            return Err(ConfigError::Message(
                "batcher.num_collectors must be >= 1".to_string(),
            ));
        }
        if self.num_workers == 0 {
            return Err(ConfigError::Message(
                "batcher.num_workers must be >= 1".to_string(),
            ));
        }
        if self.queue_capacity < self.max_batch_size {
            return Err(ConfigError::Message(format!(
                "batcher.queue_capacity ({}) must be >= batcher.max_batch_size ({})",
                self.queue_capacity, self.max_batch_size
            )));
        }
        Ok(())
    }
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            batch_timeout_ms: default_batch_timeout_ms(),
            num_collectors: default_num_collectors(),
            num_workers: default_num_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

// Defaults
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8001
}
fn default_model_kind() -> String {
    "hash".to_string()
}
fn default_dimension() -> usize {
    384
}
fn default_max_batch_size() -> usize {
    32
}
fn default_batch_timeout_ms() -> u64 {
    10
}
fn default_num_collectors() -> usize {
    2
}
fn default_num_workers() -> usize {
    1
}
fn default_queue_capacity() -> usize {
    256
}
fn default_request_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from config.toml (if present) and environment
    /// variables. Env vars override file settings, format:
    /// INFERENCE__SECTION__KEY (e.g. INFERENCE__BATCHER__MAX_BATCH_SIZE).
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("host", default_host())?
            .set_default("port", default_port() as i64)?
            .set_default("request_timeout_secs", default_request_timeout() as i64)?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("INFERENCE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.batcher.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batcher_defaults() {
        let batcher = BatcherConfig::default();
        assert_eq!(batcher.max_batch_size, 32);
        assert_eq!(batcher.batch_timeout(), Duration::from_millis(10));
        assert_eq!(batcher.num_collectors, 2);
        assert_eq!(batcher.num_workers, 1);
        assert_eq!(batcher.queue_capacity, 256);
        assert!(batcher.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let batcher = BatcherConfig {
            max_batch_size: 0,
            ..BatcherConfig::default()
        };
        assert!(batcher.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_small_queue() {
        let batcher = BatcherConfig {
            max_batch_size: 32,
            queue_capacity: 16,
            ..BatcherConfig::default()
        };
        assert!(batcher.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let batcher = BatcherConfig {
            num_workers: 0,
            ..BatcherConfig::default()
        };
        assert!(batcher.validate().is_err());
    }

    #[test]
    fn test_model_defaults() {
        let model = ModelConfig::default();
        assert_eq!(model.kind, "hash");
        assert_eq!(model.dimension, 384);
    }
}
