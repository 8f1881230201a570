//! Redis adapter for the primary cache layer and the atomic counters the
//! rate limiter needs.

use crate::CacheStorage;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tidemark_types::{ConvertError, Result};
use tracing::debug;

/// Redis-backed storage over a multiplexed tokio connection. Cloneable and
/// cheap to share; all operations are async and thread-safe.
#[derive(Clone)]
pub struct RedisStorage {
    conn: MultiplexedConnection,
}

impl RedisStorage {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| ConvertError::CacheUnavailable(format!("redis url: {e}")))?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(Self::convert_error)?;
        Ok(Self { conn })
    }

    fn convert_error(err: redis::RedisError) -> ConvertError {
        ConvertError::CacheUnavailable(format!("redis: {err}"))
    }

    /// Atomic increment-and-fetch with a window expiry set only when the
    /// counter is fresh. This is the rate limiter's primitive.
    pub async fn incr_with_window(&self, key: &str, window: Duration) -> Result<u64> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.incr(key, 1u64).await.map_err(Self::convert_error)?;
        if count == 1 {
            let _: () = conn
                .expire(key, window.as_secs() as i64)
                .await
                .map_err(Self::convert_error)?;
        }
        Ok(count)
    }

    /// Seconds until a key expires, for `x-ratelimit-reset`.
    pub async fn ttl_secs(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn.ttl(key).await.map_err(Self::convert_error)?;
        Ok(ttl)
    }
}

#[async_trait]
impl CacheStorage for RedisStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(Self::convert_error)?;
        debug!(key, hit = value.is_some(), "redis get");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, ttl.as_secs())
            .await
            .map_err(Self::convert_error)?;
        debug!(key, ttl_s = ttl.as_secs(), "redis set");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(Self::convert_error)?;
        Ok(())
    }
}
