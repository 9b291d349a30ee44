//! Database and cache connection configuration

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::{CacheManager, DbError, DbResult};

/// PostgreSQL connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Per-statement timeout applied via the connection options
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

impl DatabaseConfig {
    pub async fn connect(&self) -> DbResult<PgPool> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .after_connect({
                let timeout_ms = self.statement_timeout_ms;
                move |conn, _meta| {
                    Box::pin(async move {
                        sqlx::query(&format!("SET statement_timeout = {timeout_ms}"))
                            .execute(conn)
                            .await?;
                        Ok(())
                    })
                }
            })
            .connect(&self.url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))
    }
}

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,
}

impl RedisConfig {
    pub fn connect(&self) -> DbResult<CacheManager> {
        let cfg = deadpool_redis::Config::from_url(&self.url);
        let pool = cfg
            .builder()
            .map_err(|e| DbError::Connection(e.to_string()))?
            .max_size(self.pool_size)
            .runtime(deadpool_redis::Runtime::Tokio1)
            .build()
            .map_err(|e| DbError::Connection(e.to_string()))?;
        Ok(CacheManager::new(pool))
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_statement_timeout_ms() -> u64 {
    5_000
}

fn default_redis_pool_size() -> usize {
    16
}
