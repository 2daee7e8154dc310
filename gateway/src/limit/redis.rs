//! Redis-backed counter store.
//!
//! Sorted sets keyed per principal and window hold one member per admitted
//! request, scored by its epoch timestamp. The whole prune/count/check/
//! append/expire sequence runs as a single server-side script, so
//! concurrent gateways cannot double-admit past a limit.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tokio::sync::RwLock;

use super::store::{
    CounterStore, StoreError, StoreVerdict, Window, WindowCounts, HOUR_WINDOW_SECS,
    MINUTE_WINDOW_SECS,
};

const OP_TIMEOUT: Duration = Duration::from_secs(1);

const CHECK_AND_RECORD_SCRIPT: &str = r#"
local minute_key = KEYS[1]
local hour_key = KEYS[2]
local now = tonumber(ARGV[1])
local minute_limit = tonumber(ARGV[2])
local hour_limit = tonumber(ARGV[3])
local token = ARGV[4]
local minute_window = 60
local hour_window = 3600

redis.call('ZREMRANGEBYSCORE', minute_key, '-inf', now - minute_window)
redis.call('ZREMRANGEBYSCORE', hour_key, '-inf', now - hour_window)

local minute_count = redis.call('ZCARD', minute_key)
local hour_count = redis.call('ZCARD', hour_key)

if minute_count >= minute_limit then
    local oldest = redis.call('ZRANGE', minute_key, 0, 0, 'WITHSCORES')
    local retry_after = 1
    if #oldest > 0 then
        retry_after = math.max(1, math.ceil(tonumber(oldest[2]) + minute_window - now))
    end
    return {-1, minute_count, hour_count, retry_after}
end

if hour_count >= hour_limit then
    local oldest = redis.call('ZRANGE', hour_key, 0, 0, 'WITHSCORES')
    local retry_after = 1
    if #oldest > 0 then
        retry_after = math.max(1, math.ceil(tonumber(oldest[2]) + hour_window - now))
    end
    return {-2, minute_count, hour_count, retry_after}
end

local member = now .. ':' .. token
redis.call('ZADD', minute_key, now, member)
redis.call('ZADD', hour_key, now, member)
redis.call('EXPIRE', minute_key, minute_window * 2)
redis.call('EXPIRE', hour_key, hour_window * 2)
return {0, minute_count + 1, hour_count + 1, 0}
"#;

pub struct RedisCounterStore {
    client: Client,
    connection: RwLock<Option<ConnectionManager>>,
    script: Script,
    key_prefix: String,
}

impl RedisCounterStore {
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client =
            Client::open(redis_url).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            connection: RwLock::new(None),
            script: Script::new(CHECK_AND_RECORD_SCRIPT),
            key_prefix: "ratelimit".to_string(),
        })
    }

    fn minute_key(&self, principal: &str) -> String {
        format!("{}:minute:{}", self.key_prefix, principal)
    }

    fn hour_key(&self, principal: &str) -> String {
        format!("{}:hour:{}", self.key_prefix, principal)
    }

    /// Reuse the multiplexed connection, establishing it on first use and
    /// re-establishing it after the store comes back from an outage.
    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        if let Some(connection) = self.connection.read().await.as_ref() {
            return Ok(connection.clone());
        }

        let mut slot = self.connection.write().await;
        if let Some(connection) = slot.as_ref() {
            return Ok(connection.clone());
        }

        let connection = tokio::time::timeout(
            OP_TIMEOUT,
            ConnectionManager::new(self.client.clone()),
        )
        .await
        .map_err(|_| StoreError::Unavailable("connect timeout".to_string()))?
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        *slot = Some(connection.clone());
        Ok(connection)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn check_and_record(
        &self,
        principal: &str,
        now: f64,
        minute_limit: u32,
        hour_limit: u32,
    ) -> Result<StoreVerdict, StoreError> {
        let mut connection = self.connection().await?;
        let token: u64 = rand::random();

        let mut invocation = self.script.prepare_invoke();
        invocation
            .key(self.minute_key(principal))
            .key(self.hour_key(principal))
            .arg(now)
            .arg(minute_limit)
            .arg(hour_limit)
            .arg(token);

        let (status, minute_count, hour_count, retry_after) = tokio::time::timeout(
            OP_TIMEOUT,
            invocation.invoke_async::<(i64, u64, u64, u64)>(&mut connection),
        )
        .await
        .map_err(|_| StoreError::Unavailable("operation timeout".to_string()))?
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        match status {
            0 => Ok(StoreVerdict::Admitted {
                minute_count,
                hour_count,
            }),
            -1 => Ok(StoreVerdict::Limited {
                window: Window::Minute,
                retry_after,
            }),
            -2 => Ok(StoreVerdict::Limited {
                window: Window::Hour,
                retry_after,
            }),
            other => Err(StoreError::Unavailable(format!(
                "unexpected script status {}",
                other
            ))),
        }
    }

    async fn counts(&self, principal: &str, now: f64) -> Result<WindowCounts, StoreError> {
        let mut connection = self.connection().await?;
        let minute_key = self.minute_key(principal);
        let hour_key = self.hour_key(principal);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .zrembyscore(&minute_key, "-inf", now - MINUTE_WINDOW_SECS as f64)
            .ignore()
            .zcard(&minute_key)
            .zrembyscore(&hour_key, "-inf", now - HOUR_WINDOW_SECS as f64)
            .ignore()
            .zcard(&hour_key);

        let (minute, hour): (u64, u64) =
            tokio::time::timeout(OP_TIMEOUT, pipe.query_async(&mut connection))
                .await
                .map_err(|_| StoreError::Unavailable("operation timeout".to_string()))?
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(WindowCounts { minute, hour })
    }

    async fn reset(&self, principal: &str) -> Result<(), StoreError> {
        let mut connection = self.connection().await?;
        let deletion = connection.del::<_, ()>((
            self.minute_key(principal),
            self.hour_key(principal),
        ));
        tokio::time::timeout(OP_TIMEOUT, deletion)
            .await
            .map_err(|_| StoreError::Unavailable("operation timeout".to_string()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut connection = self.connection().await?;
        let command = redis::cmd("PING");
        tokio::time::timeout(OP_TIMEOUT, command.query_async::<()>(&mut connection))
            .await
            .map_err(|_| StoreError::Unavailable("ping timeout".to_string()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_scheme() {
        let store = RedisCounterStore::new("redis://localhost:6379/0").unwrap();
        assert_eq!(store.minute_key("user-1"), "ratelimit:minute:user-1");
        assert_eq!(store.hour_key("user-1"), "ratelimit:hour:user-1");
    }

    #[test]
    fn test_script_prunes_counts_and_expires() {
        // The script is the protocol; pin the commands it must issue.
        for command in ["ZREMRANGEBYSCORE", "ZCARD", "ZRANGE", "ZADD", "EXPIRE"] {
            assert!(
                CHECK_AND_RECORD_SCRIPT.contains(command),
                "script lost {}",
                command
            );
        }
        assert!(CHECK_AND_RECORD_SCRIPT.contains("minute_window * 2"));
    }
}
