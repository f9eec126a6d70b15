//! Redis store adapter.
//!
//! Talks RESP through a multiplexed `ConnectionManager`, which reconnects on
//! its own. Every call is bounded by the configured timeout; batch and tag
//! operations are sent as a single pipeline.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::store::{Capabilities, StoreAdapter};

// == Redis Store ==
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    timeout: Duration,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Opens a managed connection to `url`.
    ///
    /// Fails if the URL is malformed or the first connection cannot be made
    /// within `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let manager = tokio::time::timeout(timeout, client.get_connection_manager())
            .await
            .map_err(|_| StoreError::Timeout(timeout.as_millis() as u64))??;
        info!(timeout_ms = timeout.as_millis() as u64, "Redis connection manager ready");
        Ok(Self { manager, timeout })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }

    async fn bounded<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = redis::RedisResult<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl StoreAdapter for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn();
        let pong: String = self.bounded(redis::cmd("PING").query_async(&mut conn)).await?;
        if pong.eq_ignore_ascii_case("PONG") {
            Ok(())
        } else {
            Err(StoreError::Backend(format!("unexpected PING reply: {pong}")))
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn();
        self.bounded(conn.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: u64) -> StoreResult<()> {
        let mut conn = self.conn();
        if ttl == 0 {
            self.bounded(conn.set(key, value)).await
        } else {
            self.bounded(conn.set_ex(key, value, ttl)).await
        }
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        self.bounded(conn.del(keys)).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn();
        self.bounded(conn.exists(key)).await
    }

    async fn increment(&self, key: &str, amount: i64) -> StoreResult<i64> {
        let mut conn = self.conn();
        self.bounded(conn.incr(key, amount)).await
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<(u64, Vec<String>)> {
        let mut conn = self.conn();
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor).arg("MATCH").arg(pattern).arg("COUNT").arg(count);
        self.bounded(cmd.query_async(&mut conn)).await
    }

    async fn get_many(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn();
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.get(key);
        }
        self.bounded(pipe.query_async(&mut conn)).await
    }

    async fn set_many(&self, items: &[(String, String)], ttl: u64) -> StoreResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        let mut pipe = redis::pipe();
        for (key, value) in items {
            if ttl == 0 {
                pipe.set(key, value).ignore();
            } else {
                pipe.set_ex(key, value, ttl).ignore();
            }
        }
        self.bounded(pipe.query_async(&mut conn)).await
    }

    async fn sadd(&self, keys: &[String], member: &str, ttl: u64) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.sadd(key, member).ignore();
            if ttl > 0 {
                pipe.expire(key, ttl as i64).ignore();
            }
        }
        self.bounded(pipe.query_async(&mut conn)).await
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn();
        self.bounded(conn.smembers(key)).await
    }
}
