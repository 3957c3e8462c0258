//! Redis cache backend.
//!
//! Connection pooling via bb8; values are plain strings with per-key
//! expiry set at write time.

use std::time::Duration;

use bb8_redis::redis::AsyncCommands;
use bb8_redis::{bb8, RedisConnectionManager};
use thiserror::Error;

/// Errors from the cache backend. Callers treat every one of these as a
/// miss; they never fail a request.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    Connection(String),

    #[error("Cache command error: {0}")]
    Command(String),
}

/// Redis-backed key/value cache.
#[derive(Clone)]
pub struct RedisCache {
    pool: bb8::Pool<RedisConnectionManager>,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let manager = RedisConnectionManager::new(redis_url)
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        let pool = bb8::Pool::builder()
            .max_size(16)
            .build(manager)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        tracing::info!("Redis cache connected");
        Ok(Self { pool })
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        conn.get(key)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        let _: () = conn
            .set_ex(key, value, ttl.as_secs())
            .await
            .map_err(|e| CacheError::Command(e.to_string()))?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))?;
        Ok(())
    }
}
