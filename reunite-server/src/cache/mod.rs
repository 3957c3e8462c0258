//! Content cache layer.
//!
//! Three independent caches plus one singleton, each with its own TTL
//! class, shared over one backend:
//!
//! - `embed:<content-hash>` -> embedding (24 h): content-addressed, safe to
//!   share across users.
//! - `search:<fingerprint>` -> ranked match list (3 h): deliberately NOT
//!   invalidated by new admissions - bounded staleness is the tradeoff.
//! - `person:<id>` -> display metadata (6 h): populated at promotion.
//! - `dashboard` (30 s): invalidated on every person/registration mutation.
//!
//! Caches are best-effort throughout: a backend failure logs a warning and
//! degrades to a miss, never failing the primary request.

mod memory;
mod redis;

pub use memory::MemoryCache;
pub use redis::{CacheError, RedisCache};

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use reunite_core::Embedding;

const EMBEDDING_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const SEARCH_TTL: Duration = Duration::from_secs(3 * 60 * 60);
const PERSON_TTL: Duration = Duration::from_secs(6 * 60 * 60);
const DASHBOARD_TTL: Duration = Duration::from_secs(30);

const DASHBOARD_KEY: &str = "dashboard";

/// Cache storage backend.
pub enum CacheBackend {
    /// Redis storage (production)
    Redis(RedisCache),
    /// In-memory storage (development fallback and tests)
    Memory(MemoryCache),
}

impl CacheBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Redis(_) => "redis",
            Self::Memory(_) => "memory",
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self {
            Self::Redis(redis) => redis.get(key).await,
            Self::Memory(memory) => Ok(memory.get(key)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        match self {
            Self::Redis(redis) => redis.set(key, value, ttl).await,
            Self::Memory(memory) => {
                memory.set(key, value, ttl);
                Ok(())
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        match self {
            Self::Redis(redis) => redis.delete(key).await,
            Self::Memory(memory) => {
                memory.delete(key);
                Ok(())
            }
        }
    }
}

/// Typed, best-effort view over the cache backend.
#[derive(Clone)]
pub struct CacheLayer {
    backend: Arc<CacheBackend>,
}

impl CacheLayer {
    pub fn new(backend: CacheBackend) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(CacheBackend::Memory(MemoryCache::new()))
    }

    pub fn kind(&self) -> &'static str {
        self.backend.kind()
    }

    // ==================== Embedding cache ====================

    pub async fn embedding(&self, content_hash: &str) -> Option<Embedding> {
        self.get_json(&format!("embed:{content_hash}")).await
    }

    pub async fn store_embedding(&self, content_hash: &str, embedding: &Embedding) {
        self.put_json(&format!("embed:{content_hash}"), embedding, EMBEDDING_TTL)
            .await;
    }

    // ==================== Search result cache ====================

    pub async fn search_results<T: DeserializeOwned>(&self, fingerprint: &str) -> Option<T> {
        self.get_json(&format!("search:{fingerprint}")).await
    }

    pub async fn store_search_results<T: Serialize>(&self, fingerprint: &str, results: &T) {
        self.put_json(&format!("search:{fingerprint}"), results, SEARCH_TTL)
            .await;
    }

    // ==================== Person metadata cache ====================

    pub async fn person_metadata<T: DeserializeOwned>(&self, person_id: Uuid) -> Option<T> {
        self.get_json(&format!("person:{person_id}")).await
    }

    pub async fn store_person_metadata<T: Serialize>(&self, person_id: Uuid, metadata: &T) {
        self.put_json(&format!("person:{person_id}"), metadata, PERSON_TTL)
            .await;
    }

    pub async fn invalidate_person(&self, person_id: Uuid) {
        self.delete(&format!("person:{person_id}")).await;
    }

    // ==================== Dashboard singleton ====================

    pub async fn dashboard<T: DeserializeOwned>(&self) -> Option<T> {
        self.get_json(DASHBOARD_KEY).await
    }

    pub async fn store_dashboard<T: Serialize>(&self, snapshot: &T) {
        self.put_json(DASHBOARD_KEY, snapshot, DASHBOARD_TTL).await;
    }

    pub async fn invalidate_dashboard(&self) {
        self.delete(DASHBOARD_KEY).await;
    }

    // ==================== Internals ====================

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache value serialization failed");
                return;
            }
        };
        if let Err(e) = self.backend.set(key, &raw, ttl).await {
            tracing::warn!(key, error = %e, "Cache write failed");
        }
    }

    async fn delete(&self, key: &str) {
        if let Err(e) = self.backend.delete(key).await {
            tracing::warn!(key, error = %e, "Cache delete failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embedding_roundtrip() {
        let cache = CacheLayer::in_memory();
        let embedding = Embedding::from_raw(vec![1.0; reunite_core::EMBEDDING_DIM]).unwrap();

        assert!(cache.embedding("abc").await.is_none());
        cache.store_embedding("abc", &embedding).await;
        assert_eq!(cache.embedding("abc").await.unwrap(), embedding);
        // Different content hash is a different key.
        assert!(cache.embedding("def").await.is_none());
    }

    #[tokio::test]
    async fn test_dashboard_invalidation() {
        let cache = CacheLayer::in_memory();
        cache
            .store_dashboard(&serde_json::json!({"total_persons": 3}))
            .await;
        assert!(cache.dashboard::<serde_json::Value>().await.is_some());

        cache.invalidate_dashboard().await;
        assert!(cache.dashboard::<serde_json::Value>().await.is_none());
    }

    #[tokio::test]
    async fn test_person_metadata_roundtrip_and_invalidate() {
        let cache = CacheLayer::in_memory();
        let id = Uuid::new_v4();
        cache
            .store_person_metadata(id, &serde_json::json!({"name": "Asha"}))
            .await;
        let value: serde_json::Value = cache.person_metadata(id).await.unwrap();
        assert_eq!(value["name"], "Asha");

        cache.invalidate_person(id).await;
        assert!(cache.person_metadata::<serde_json::Value>(id).await.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let backend = CacheBackend::Memory(MemoryCache::new());
        if let CacheBackend::Memory(ref memory) = backend {
            memory.set("search:xyz", "{not json", Duration::from_secs(60));
        }
        let cache = CacheLayer::new(backend);
        let result: Option<Vec<String>> = cache.search_results("xyz").await;
        assert!(result.is_none());
    }
}
