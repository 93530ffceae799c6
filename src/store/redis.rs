//! Redis-backed store adapter (`redis` cargo feature).
//!
//! Thin mapping from the [`Store`] capability onto the `redis` crate's async
//! API. TTLs are expressed in milliseconds via `PX`, set-if-absent via
//! `SET .. NX PX ..`, and scripts via `EVALSHA`/`EVAL`. The `NOSCRIPT` reply
//! is translated to [`StoreError::NoScript`] so the release protocol can
//! perform its one source-resubmission retry; every other failure becomes
//! [`StoreError::Backend`].

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError};

use crate::error::StoreError;
use crate::store::Store;

/// [`Store`] implementation over a Redis connection manager.
///
/// The connection manager multiplexes and reconnects internally; cloning the
/// store is cheap and shares the underlying connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Wraps an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connects to the given Redis URL (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(to_store_error)?;
        let conn = client.get_connection_manager().await.map_err(to_store_error)?;
        Ok(Self { conn })
    }
}

fn to_store_error(err: RedisError) -> StoreError {
    if err.code() == Some("NOSCRIPT") {
        StoreError::NoScript
    } else {
        StoreError::Backend(err.to_string())
    }
}

/// Redis rejects `PX 0`; clamp to the minimum expressible expiry.
fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> =
            redis::cmd("GET").arg(key).query_async(&mut conn).await.map_err(to_store_error)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<()>(&mut conn)
            .await
            .map_err(to_store_error)
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(to_store_error)?;
        Ok(reply.is_some())
    }

    async fn eval_sha(
        &self,
        hash: &str,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("EVALSHA")
            .arg(hash)
            .arg(keys.len())
            .arg(keys)
            .arg(args)
            .query_async(&mut conn)
            .await
            .map_err(to_store_error)
    }

    async fn eval(&self, source: &str, keys: &[&str], args: &[&str]) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("EVAL")
            .arg(source)
            .arg(keys.len())
            .arg(keys)
            .arg(args)
            .query_async(&mut conn)
            .await
            .map_err(to_store_error)
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL").arg(keys).query_async(&mut conn).await.map_err(to_store_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_never_maps_to_zero_px() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(10)), 10_000);
    }
}
