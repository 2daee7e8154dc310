//! Sliding-window rate limiting.
//!
//! Two overlapping windows per principal (minute and hour); a request is
//! admitted only when both windows are under their limits. The counter
//! store executes the window protocol atomically, so the limit holds across
//! any number of gateway instances sharing the store.

mod redis;
mod store;

pub use self::redis::RedisCounterStore;
pub use store::{
    CounterStore, MemoryCounterStore, StoreError, StoreVerdict, Window, WindowCounts,
    HOUR_WINDOW_SECS, MINUTE_WINDOW_SECS,
};

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use prometheus::IntCounter;

use crate::config::RateLimitConfig;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed {
        minute_count: u64,
        hour_count: u64,
    },
    Denied {
        /// "minute", "hour", or "unavailable" when the store is down and
        /// bypass is off.
        limit_type: String,
        limit: u32,
        retry_after: u64,
    },
}

/// Read-only usage snapshot for a principal.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UsageSnapshot {
    pub requests_last_minute: u64,
    pub requests_last_hour: u64,
    pub timestamp: String,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Decide whether to admit a request, recording it on admission.
    async fn check(&self, principal: &str, minute_limit: u32, hour_limit: u32) -> Decision;

    /// Current usage without recording an event.
    async fn usage(&self, principal: &str) -> UsageSnapshot;

    /// Drop a principal's recorded events.
    async fn reset(&self, principal: &str);

    /// Reported in /health: "distributed", "local" or "disabled".
    fn mode(&self) -> &'static str;
}

fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn utc_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Sliding-window limiter over a counter store.
pub struct SlidingWindowLimiter {
    store: Arc<dyn CounterStore>,
    /// Allow requests through when the store is unreachable.
    bypass_on_failure: bool,
    /// Counts requests admitted because the store was unreachable.
    fallback_allows: IntCounter,
    mode: &'static str,
}

impl SlidingWindowLimiter {
    pub fn new(
        store: Arc<dyn CounterStore>,
        bypass_on_failure: bool,
        fallback_allows: IntCounter,
        mode: &'static str,
    ) -> Self {
        Self {
            store,
            bypass_on_failure,
            fallback_allows,
            mode,
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn check(&self, principal: &str, minute_limit: u32, hour_limit: u32) -> Decision {
        let now = epoch_now();
        match self
            .store
            .check_and_record(principal, now, minute_limit, hour_limit)
            .await
        {
            Ok(StoreVerdict::Admitted {
                minute_count,
                hour_count,
            }) => Decision::Allowed {
                minute_count,
                hour_count,
            },
            Ok(StoreVerdict::Limited {
                window,
                retry_after,
            }) => {
                let limit = match window {
                    Window::Minute => minute_limit,
                    Window::Hour => hour_limit,
                };
                tracing::warn!(
                    principal,
                    limit_type = window.as_str(),
                    limit,
                    retry_after,
                    "Rate limit exceeded"
                );
                Decision::Denied {
                    limit_type: window.as_str().to_string(),
                    limit,
                    retry_after,
                }
            }
            Err(error) => {
                if self.bypass_on_failure {
                    tracing::warn!(%error, "Counter store unreachable, admitting request");
                    self.fallback_allows.inc();
                    Decision::Allowed {
                        minute_count: 0,
                        hour_count: 0,
                    }
                } else {
                    tracing::warn!(%error, "Counter store unreachable, denying request");
                    Decision::Denied {
                        limit_type: "unavailable".to_string(),
                        limit: minute_limit,
                        retry_after: 1,
                    }
                }
            }
        }
    }

    async fn usage(&self, principal: &str) -> UsageSnapshot {
        let counts = self
            .store
            .counts(principal, epoch_now())
            .await
            .unwrap_or(WindowCounts { minute: 0, hour: 0 });
        UsageSnapshot {
            requests_last_minute: counts.minute,
            requests_last_hour: counts.hour,
            timestamp: utc_timestamp(),
        }
    }

    async fn reset(&self, principal: &str) {
        if let Err(error) = self.store.reset(principal).await {
            tracing::warn!(%error, principal, "Failed to reset rate limit");
        }
    }

    fn mode(&self) -> &'static str {
        self.mode
    }
}

/// No-op limiter used when rate limiting is disabled.
pub struct NoopRateLimiter;

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn check(&self, _principal: &str, _minute_limit: u32, _hour_limit: u32) -> Decision {
        Decision::Allowed {
            minute_count: 0,
            hour_count: 0,
        }
    }

    async fn usage(&self, _principal: &str) -> UsageSnapshot {
        UsageSnapshot {
            requests_last_minute: 0,
            requests_last_hour: 0,
            timestamp: utc_timestamp(),
        }
    }

    async fn reset(&self, _principal: &str) {}

    fn mode(&self) -> &'static str {
        "disabled"
    }
}

/// Build the limiter for the configured backend.
///
/// Bypass wins outright; otherwise the Redis store is probed once at
/// startup. An unreachable store with `bypass_on_failure` set disables rate
/// limiting for the process lifetime (reported in /health); without the
/// flag the limiter stays up and fails closed per request. A malformed
/// store URL is a configuration error and aborts startup.
pub async fn create_rate_limiter(
    config: &RateLimitConfig,
    fallback_allows: IntCounter,
) -> Result<Arc<dyn RateLimiter>, StoreError> {
    if config.bypass {
        tracing::warn!("Rate limiting disabled via configuration");
        return Ok(Arc::new(NoopRateLimiter));
    }

    let store = Arc::new(RedisCounterStore::new(&config.redis_url)?);

    match store.ping().await {
        Ok(()) => {
            tracing::info!(redis_url = %config.redis_url, mode = "distributed", "Redis rate limiter active");
            Ok(Arc::new(SlidingWindowLimiter::new(
                store,
                config.bypass_on_failure,
                fallback_allows,
                "distributed",
            )))
        }
        Err(error) if config.bypass_on_failure => {
            tracing::warn!(
                %error,
                redis_url = %config.redis_url,
                "Counter store not reachable, rate limiting disabled"
            );
            Ok(Arc::new(NoopRateLimiter))
        }
        Err(error) => {
            tracing::warn!(
                %error,
                redis_url = %config.redis_url,
                "Counter store not reachable, failing closed until it returns"
            );
            Ok(Arc::new(SlidingWindowLimiter::new(
                store,
                false,
                fallback_allows,
                "distributed",
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> IntCounter {
        IntCounter::new("test_rate_limit_fallback_total", "test").unwrap()
    }

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn check_and_record(
            &self,
            _principal: &str,
            _now: f64,
            _minute_limit: u32,
            _hour_limit: u32,
        ) -> Result<StoreVerdict, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn counts(&self, _principal: &str, _now: f64) -> Result<WindowCounts, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn reset(&self, _principal: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_allows_then_denies_at_minute_limit() {
        let limiter = SlidingWindowLimiter::new(
            Arc::new(MemoryCounterStore::new()),
            true,
            counter(),
            "local",
        );

        assert!(matches!(
            limiter.check("user", 2, 1000).await,
            Decision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check("user", 2, 1000).await,
            Decision::Allowed { .. }
        ));

        match limiter.check("user", 2, 1000).await {
            Decision::Denied {
                limit_type, limit, ..
            } => {
                assert_eq!(limit_type, "minute");
                assert_eq!(limit, 2);
            }
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_usage_does_not_count_as_request() {
        let limiter = SlidingWindowLimiter::new(
            Arc::new(MemoryCounterStore::new()),
            true,
            counter(),
            "local",
        );

        limiter.check("user", 10, 100).await;
        let first = limiter.usage("user").await;
        let second = limiter.usage("user").await;

        assert_eq!(first.requests_last_minute, 1);
        assert_eq!(second.requests_last_minute, 1);
        assert_eq!(first.requests_last_hour, 1);
    }

    #[tokio::test]
    async fn test_store_failure_with_bypass_allows_and_counts() {
        let fallback = counter();
        let limiter =
            SlidingWindowLimiter::new(Arc::new(BrokenStore), true, fallback.clone(), "distributed");

        for _ in 0..3 {
            assert!(matches!(
                limiter.check("user", 1, 1).await,
                Decision::Allowed { .. }
            ));
        }
        assert_eq!(fallback.get(), 3);
    }

    #[tokio::test]
    async fn test_store_failure_without_bypass_fails_closed() {
        let limiter =
            SlidingWindowLimiter::new(Arc::new(BrokenStore), false, counter(), "distributed");

        match limiter.check("user", 60, 1000).await {
            Decision::Denied {
                limit_type,
                retry_after,
                ..
            } => {
                assert_eq!(limit_type, "unavailable");
                assert_eq!(retry_after, 1);
            }
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_noop_limiter_always_allows() {
        let limiter = NoopRateLimiter;
        assert!(matches!(
            limiter.check("user", 0, 0).await,
            Decision::Allowed { .. }
        ));
        assert_eq!(limiter.mode(), "disabled");

        let usage = limiter.usage("user").await;
        assert_eq!(usage.requests_last_minute, 0);
        assert_eq!(usage.requests_last_hour, 0);
    }
}
