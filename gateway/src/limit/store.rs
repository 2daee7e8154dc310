//! Counter store seam for distributed rate limiting.
//!
//! The store owns the atomic sliding-window protocol: prune both windows,
//! count, check minute-then-hour, append on admit, refresh TTLs. Everything
//! above it (degradation, usage formatting, response mapping) lives in the
//! limiter. Admission appends to both windows or neither, so a denial never
//! leaves a phantom event behind.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

pub const MINUTE_WINDOW_SECS: u64 = 60;
pub const HOUR_WINDOW_SECS: u64 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// The two rate-limit windows, checked in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Minute,
    Hour,
}

impl Window {
    pub fn secs(self) -> u64 {
        match self {
            Window::Minute => MINUTE_WINDOW_SECS,
            Window::Hour => HOUR_WINDOW_SECS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Window::Minute => "minute",
            Window::Hour => "hour",
        }
    }
}

/// Outcome of an atomic check-and-record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreVerdict {
    /// The event was recorded in both windows.
    Admitted { minute_count: u64, hour_count: u64 },
    /// A window is at its limit; nothing was recorded.
    Limited {
        window: Window,
        retry_after: u64,
    },
}

/// Pruned cardinality of both windows, no event recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounts {
    pub minute: u64,
    pub hour: u64,
}

/// Seconds until the oldest surviving event leaves the window.
pub fn retry_after(oldest: f64, window_secs: u64, now: f64) -> u64 {
    let secs = (oldest + window_secs as f64 - now).ceil();
    if secs < 1.0 {
        1
    } else {
        secs as u64
    }
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically prune both of the principal's windows, count them, deny
    /// on the first exceeded limit, otherwise record `now` in both.
    async fn check_and_record(
        &self,
        principal: &str,
        now: f64,
        minute_limit: u32,
        hour_limit: u32,
    ) -> Result<StoreVerdict, StoreError>;

    /// Prune and count both windows without recording an event.
    async fn counts(&self, principal: &str, now: f64) -> Result<WindowCounts, StoreError>;

    /// Drop all recorded events for a principal.
    async fn reset(&self, principal: &str) -> Result<(), StoreError>;

    /// Reachability probe.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Default)]
struct PrincipalEvents {
    minute: Vec<f64>,
    hour: Vec<f64>,
}

/// Single-process counter store over in-memory sorted event vectors.
///
/// Implements the same protocol as the Redis store; the mutex stands in for
/// the server-side script's atomicity. Suitable for single-instance
/// deployments and tests.
#[derive(Default)]
pub struct MemoryCounterStore {
    events: Mutex<HashMap<String, PrincipalEvents>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn prune(events: &mut Vec<f64>, cutoff: f64) {
    events.retain(|t| *t > cutoff);
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn check_and_record(
        &self,
        principal: &str,
        now: f64,
        minute_limit: u32,
        hour_limit: u32,
    ) -> Result<StoreVerdict, StoreError> {
        let mut events = self.events.lock().expect("counter store mutex");
        let principal_events = events.entry(principal.to_string()).or_default();

        prune(&mut principal_events.minute, now - MINUTE_WINDOW_SECS as f64);
        prune(&mut principal_events.hour, now - HOUR_WINDOW_SECS as f64);

        if principal_events.minute.len() as u64 >= minute_limit as u64 {
            let oldest = principal_events.minute.first().copied().unwrap_or(now);
            return Ok(StoreVerdict::Limited {
                window: Window::Minute,
                retry_after: retry_after(oldest, MINUTE_WINDOW_SECS, now),
            });
        }

        if principal_events.hour.len() as u64 >= hour_limit as u64 {
            let oldest = principal_events.hour.first().copied().unwrap_or(now);
            return Ok(StoreVerdict::Limited {
                window: Window::Hour,
                retry_after: retry_after(oldest, HOUR_WINDOW_SECS, now),
            });
        }

        principal_events.minute.push(now);
        principal_events.hour.push(now);

        Ok(StoreVerdict::Admitted {
            minute_count: principal_events.minute.len() as u64,
            hour_count: principal_events.hour.len() as u64,
        })
    }

    async fn counts(&self, principal: &str, now: f64) -> Result<WindowCounts, StoreError> {
        let mut events = self.events.lock().expect("counter store mutex");
        let Some(principal_events) = events.get_mut(principal) else {
            return Ok(WindowCounts { minute: 0, hour: 0 });
        };

        prune(&mut principal_events.minute, now - MINUTE_WINDOW_SECS as f64);
        prune(&mut principal_events.hour, now - HOUR_WINDOW_SECS as f64);

        Ok(WindowCounts {
            minute: principal_events.minute.len() as u64,
            hour: principal_events.hour.len() as u64,
        })
    }

    async fn reset(&self, principal: &str) -> Result<(), StoreError> {
        self.events
            .lock()
            .expect("counter store mutex")
            .remove(principal);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
