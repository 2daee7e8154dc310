//! Configuration for the API gateway.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL of the inference service.
    #[serde(default = "default_inference_url")]
    pub inference_url: String,
    /// Per-request timeout for the upstream call, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Development API key. When unset, a key is generated and logged at
    /// startup.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per principal per minute.
    #[serde(default = "default_per_minute")]
    pub per_minute: u32,
    /// Requests allowed per principal per hour.
    #[serde(default = "default_per_hour")]
    pub per_hour: u32,
    /// Disable rate limiting entirely.
    #[serde(default)]
    pub bypass: bool,
    /// Allow requests when the counter store is unreachable.
    #[serde(default = "default_true")]
    pub bypass_on_failure: bool,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
            per_hour: default_per_hour(),
            bypass: false,
            bypass_on_failure: default_true(),
            redis_url: default_redis_url(),
        }
    }
}

// Defaults
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_inference_url() -> String {
    "http://localhost:8001".to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_per_minute() -> u32 {
    60
}
fn default_per_hour() -> u32 {
    1000
}
fn default_redis_url() -> String {
    "redis://localhost:6379/0".to_string()
}
fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from config.toml (if present) and environment
    /// variables. Env vars override file settings, format:
    /// GATEWAY__SECTION__KEY (e.g. GATEWAY__RATE_LIMIT__PER_MINUTE).
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("host", default_host())?
            .set_default("port", default_port() as i64)?
            .set_default("inference_url", default_inference_url())?
            .set_default("request_timeout_secs", default_request_timeout() as i64)?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
