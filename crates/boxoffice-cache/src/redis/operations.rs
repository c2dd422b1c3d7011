//! Redis coordination store implementation.
//!
//! Every trait method maps to one Redis command, one atomic pipeline, or
//! one Lua script, so each call is atomic per key on the server.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Script};

use boxoffice_core::error::{AppError, ErrorKind};
use boxoffice_core::result::AppResult;
use boxoffice_core::traits::{CoordinationStore, WindowCount};

use super::client::RedisClient;

/// Increment a window counter and start its expiry on first use.
///
/// Keys left without an expiry (e.g. by an interrupted writer) get the
/// window applied again so a counter can never block forever.
static INCR_WINDOW: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
  ttl = tonumber(ARGV[1])
end
return {count, ttl}
",
    )
});

/// Redis-backed coordination store.
#[derive(Debug, Clone)]
pub struct RedisStore {
    /// Redis client.
    client: RedisClient,
}

impl RedisStore {
    /// Create a new Redis store.
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    /// Map a Redis error to an AppError.
    ///
    /// Any failure to complete a command leaves the caller without a
    /// trustworthy answer, so all of them surface as `StoreUnavailable`.
    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::StoreUnavailable, format!("Redis error: {e}"), e)
    }
}

/// Clamp a TTL to whole milliseconds, never zero.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let result: Option<String> = conn.get(&full_key).await.map_err(Self::map_err)?;
        Ok(result)
    }

    async fn get_with_ttl(&self, key: &str) -> AppResult<Option<(String, Option<Duration>)>> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();

        let (value, pttl): (Option<String>, i64) = redis::pipe()
            .atomic()
            .get(&full_key)
            .cmd("PTTL")
            .arg(&full_key)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        // PTTL: -1 = no expiry, -2 = missing.
        let ttl = u64::try_from(pttl).ok().map(Duration::from_millis);
        Ok(value.map(|v| (v, ttl)))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let _: () = redis::cmd("SET")
            .arg(&full_key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let removed: i64 = conn.del(&full_key).await.map_err(Self::map_err)?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let result: bool = conn.exists(&full_key).await.map_err(Self::map_err)?;
        Ok(result)
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();

        // SET key value PX ttl NX
        let result: Option<String> = redis::cmd("SET")
            .arg(&full_key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        Ok(result.is_some())
    }

    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<WindowCount> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();

        let (count, pttl): (i64, i64) = INCR_WINDOW
            .key(&full_key)
            .arg(ttl_millis(window))
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        Ok(WindowCount {
            count: u64::try_from(count).unwrap_or(0),
            ttl: Duration::from_millis(u64::try_from(pttl).unwrap_or(0)),
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(pong == "PONG")
    }
}
