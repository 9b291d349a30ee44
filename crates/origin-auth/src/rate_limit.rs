//! Redis token-bucket rate limiting
//!
//! One bucket per tenant, refilled continuously at the tenant's configured
//! rate up to its burst capacity. Both the bucket key and its last-refill
//! key carry a TTL refreshed on every request, so idle tenants leave
//! nothing behind in the cache.

use std::sync::atomic::AtomicU64;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use origin_db::{cache::keys, CacheManager};

use crate::AuthResult;

/// Atomic take-one-token script. Reads both keys, refills by elapsed time,
/// then writes both back with the idle TTL.
const TAKE_TOKEN_SCRIPT: &str = r#"
local tokens_key = KEYS[1]
local refill_key = KEYS[2]
local rate = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local tokens = tonumber(redis.call('GET', tokens_key))
if tokens == nil then tokens = capacity end
local last = tonumber(redis.call('GET', refill_key))
if last == nil then last = now end

local elapsed = now - last
if elapsed < 0 then elapsed = 0 end
tokens = math.min(capacity, tokens + elapsed * rate)

local allowed = 0
if tokens >= 1 then
    tokens = tokens - 1
    allowed = 1
end

redis.call('SET', tokens_key, tostring(tokens), 'EX', ttl)
redis.call('SET', refill_key, tostring(now), 'EX', ttl)

local deficit = 1 - tokens
if deficit < 0 then deficit = 0 end
return {allowed, tostring(deficit / rate)}
"#;

/// Count of denied requests, for /metrics
pub static RATE_LIMITED_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after_seconds: u64 },
}

/// Token-bucket limiter persisted in the shared cache
#[derive(Clone)]
pub struct RateLimiter {
    cache: CacheManager,
    ttl: Duration,
}

impl RateLimiter {
    pub fn new(cache: CacheManager, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Take one token from the tenant's bucket.
    ///
    /// A cache outage admits the request with a warning rather than
    /// failing the whole ingest path; the outage itself is visible in
    /// logs and the readiness probe.
    pub async fn check(
        &self,
        tenant_id: Uuid,
        per_minute: i32,
        burst: i32,
    ) -> AuthResult<RateDecision> {
        let tokens_key = format!("{}{}", keys::RATE_LIMIT, tenant_id);
        let refill_key = format!("{}{}:last_refill", keys::RATE_LIMIT, tenant_id);
        let rate = f64::from(per_minute.max(1)) / 60.0;
        let capacity = f64::from(burst.max(1));
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();

        let mut conn = match self.cache.pool().get().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(tenant_id = %tenant_id, error = %e, "rate limiter cache unavailable, admitting request");
                return Ok(RateDecision::Allowed);
            }
        };

        let script = redis::Script::new(TAKE_TOKEN_SCRIPT);
        let result: Result<(i64, String), _> = script
            .key(&tokens_key)
            .key(&refill_key)
            .arg(rate)
            .arg(capacity)
            .arg(now)
            .arg(self.ttl.as_secs())
            .invoke_async(&mut conn)
            .await;

        match result {
            Ok((1, _)) => Ok(RateDecision::Allowed),
            Ok((_, deficit_seconds)) => {
                let retry_after_seconds =
                    deficit_seconds.parse::<f64>().unwrap_or(1.0).ceil().max(1.0) as u64;
                Ok(RateDecision::Limited {
                    retry_after_seconds,
                })
            }
            Err(e) => {
                tracing::warn!(tenant_id = %tenant_id, error = %e, "rate limiter script failed, admitting request");
                Ok(RateDecision::Allowed)
            }
        }
    }
}
