//! Redis cache manager for rate limiting and broker state

use deadpool_redis::{redis::AsyncCommands, Pool as RedisPool};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use crate::DbResult;

/// Cache key prefixes for organization
pub mod keys {
    pub const RATE_LIMIT: &str = "rate_limit:";
    pub const TASK_STATUS: &str = "task_status:";
    pub const TASK_QUEUE: &str = "task_queue:evidence";
}

/// Default TTLs
pub mod ttl {
    use std::time::Duration;

    pub const RATE_LIMIT: Duration = Duration::from_secs(600);
    pub const TASK_STATUS: Duration = Duration::from_secs(24 * 60 * 60);
}

#[derive(Clone)]
pub struct CacheManager {
    pool: RedisPool,
}

impl CacheManager {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }

    // =========================================================================
    // Basic Operations
    // =========================================================================

    /// Set a JSON value with expiration
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> DbResult<()> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(value)?;
        conn.set_ex::<_, _, ()>(key, json, ttl.as_secs()).await?;
        Ok(())
    }

    /// Get a JSON value
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        let mut conn = self.pool.get().await?;
        let result: Option<String> = conn.get(key).await?;
        match result {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Get a raw string value
    pub async fn get_raw(&self, key: &str) -> DbResult<Option<String>> {
        let mut conn = self.pool.get().await?;
        Ok(conn.get(key).await?)
    }

    /// Set a raw string value with expiration
    pub async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> DbResult<()> {
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    /// Delete a key
    pub async fn delete(&self, key: &str) -> DbResult<()> {
        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    // =========================================================================
    // Queue Operations (evidence task broker)
    // =========================================================================

    /// Push a job onto a list queue
    pub async fn queue_push(&self, queue: &str, payload: &str) -> DbResult<()> {
        let mut conn = self.pool.get().await?;
        conn.lpush::<_, _, ()>(queue, payload).await?;
        Ok(())
    }

    /// Blocking pop from a list queue; returns None on timeout
    pub async fn queue_pop(&self, queue: &str, timeout: Duration) -> DbResult<Option<String>> {
        let mut conn = self.pool.get().await?;
        let result: Option<(String, String)> =
            conn.brpop(queue, timeout.as_secs_f64()).await?;
        Ok(result.map(|(_, payload)| payload))
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// PING for readiness checks
    pub async fn ping(&self) -> DbResult<()> {
        let mut conn = self.pool.get().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;
        Ok(())
    }
}
