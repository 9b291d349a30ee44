//! ORIGIN Database Layer
//!
//! Persistence for the upload-governance platform using PostgreSQL and
//! Redis.
//!
//! # Architecture
//!
//! - **PostgreSQL**: tenants, api keys, uploads, certificates, the
//!   hash-chained ledger, evidence packs, webhooks, idempotency records
//! - **Redis**: rate-limit buckets and the evidence task broker
//!
//! # Repository Pattern
//!
//! Each domain has its own repository with CRUD and domain-specific
//! queries. Writes that must be atomic with the ingest decision accept a
//! `sqlx::Transaction` instead of the pool.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod repos;

use sqlx::PgPool;
use tracing::info;

pub use cache::CacheManager;
pub use config::{DatabaseConfig, RedisConfig};
pub use error::{DbError, DbResult};
pub use models::*;
pub use repos::*;

/// Embedded migrator for startup and the readiness head-revision check
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Database connection pool and cache
#[derive(Clone)]
pub struct Database {
    /// PostgreSQL connection pool
    pub pg: PgPool,
    /// Redis-backed cache manager
    pub cache: CacheManager,
}

impl Database {
    /// Connect to PostgreSQL and Redis
    pub async fn connect(db: &DatabaseConfig, redis: &RedisConfig) -> DbResult<Self> {
        let pg = db.connect().await?;
        info!("Connected to PostgreSQL");

        let cache = redis.connect()?;
        cache.ping().await?;
        info!("Connected to Redis");

        Ok(Self { pg, cache })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> DbResult<()> {
        info!("Running database migrations...");
        MIGRATOR
            .run(&self.pg)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
        info!("Migrations complete");
        Ok(())
    }

    /// Whether every embedded migration has been applied
    pub async fn migrations_at_head(&self) -> DbResult<bool> {
        let applied: Vec<i64> =
            sqlx::query_scalar("SELECT version FROM _sqlx_migrations ORDER BY version")
                .fetch_all(&self.pg)
                .await?;
        let expected: Vec<i64> = MIGRATOR.iter().map(|m| m.version).collect();
        Ok(applied == expected)
    }

    /// `SELECT 1` for readiness checks
    pub async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pg).await?;
        Ok(())
    }

    pub fn tenants(&self) -> TenantRepo {
        TenantRepo::new(self.pg.clone())
    }

    pub fn api_keys(&self) -> ApiKeyRepo {
        ApiKeyRepo::new(self.pg.clone())
    }

    pub fn identities(&self) -> IdentityRepo {
        IdentityRepo::new(self.pg.clone())
    }

    pub fn uploads(&self) -> UploadRepo {
        UploadRepo::new(self.pg.clone())
    }

    pub fn policy_profiles(&self) -> PolicyProfileRepo {
        PolicyProfileRepo::new(self.pg.clone())
    }

    pub fn certificates(&self) -> CertificateRepo {
        CertificateRepo::new(self.pg.clone())
    }

    pub fn evidence(&self) -> EvidenceRepo {
        EvidenceRepo::new(self.pg.clone())
    }

    pub fn webhooks(&self) -> WebhookRepo {
        WebhookRepo::new(self.pg.clone())
    }

    pub fn idempotency(&self) -> IdempotencyRepo {
        IdempotencyRepo::new(self.pg.clone())
    }
}
