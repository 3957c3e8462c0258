//! Application state module
//!
//! The composition root: every workflow dependency (store, cache, vector
//! index, media storage, face pipeline, auth) is constructed here and
//! injected explicitly - no module-level client handles. Each backend
//! falls back to an in-memory implementation when its endpoint is not
//! configured, with a warning, so the service runs end-to-end in
//! development and tests without external services.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use reunite_core::{
    CloseupHeuristic, FaceEngine, FaceError, FacePipeline, HttpFaceEngine, HttpFaceEngineConfig,
    MockFaceEngine,
};

use crate::auth::JwksCache;
use crate::cache::{CacheBackend, CacheError, CacheLayer, RedisCache};
use crate::config::Config;
use crate::index::{FaceIndex, IndexError, QdrantFaceIndex};
use crate::media::{HttpMediaStore, MediaError, MediaStorage};
use crate::store::{Store, StoreError};

/// Minimum detection confidence the pipeline accepts.
const MIN_DETECTION_SCORE: f32 = 0.3;

/// Startup failures. A configured-but-unreachable backend aborts startup;
/// fallbacks only apply when a backend is not configured at all.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Store bootstrap failed: {0}")]
    Store(#[from] StoreError),

    #[error("Cache bootstrap failed: {0}")]
    Cache(#[from] CacheError),

    #[error("Vector index bootstrap failed: {0}")]
    Index(#[from] IndexError),

    #[error("Media store bootstrap failed: {0}")]
    Media(#[from] MediaError),

    #[error("Face engine bootstrap failed: {0}")]
    Engine(#[from] FaceError),
}

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Relational store for persons and registrations
    pub store: Arc<Store>,
    /// Best-effort content cache layer
    pub cache: CacheLayer,
    /// Vector index over verified face embeddings
    pub index: Arc<FaceIndex>,
    /// Durable image hosting
    pub media: Arc<MediaStorage>,
    /// Face extraction pipeline
    pub pipeline: Arc<FacePipeline>,
    /// JWKS cache for admin JWT validation
    pub jwks_cache: Option<Arc<JwksCache>>,
}

impl AppState {
    /// Build state from configuration, connecting every configured backend.
    pub async fn from_config(config: Config) -> Result<Self, BootstrapError> {
        let store = match config.database_url.as_deref() {
            Some(url) => {
                Store::connect_postgres(
                    url,
                    config.database_max_connections,
                    &config.case_id_prefix,
                )
                .await?
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store");
                Store::in_memory(&config.case_id_prefix)
            }
        };

        let cache = match config.redis_url.as_deref() {
            Some(url) => CacheLayer::new(CacheBackend::Redis(RedisCache::connect(url).await?)),
            None => {
                tracing::warn!("REDIS_URL not set, using in-memory cache");
                CacheLayer::in_memory()
            }
        };

        let index = match config.qdrant_url.as_deref() {
            Some(url) => FaceIndex::Qdrant(
                QdrantFaceIndex::connect(
                    url,
                    config.qdrant_api_key.as_deref(),
                    &config.qdrant_collection,
                )
                .await?,
            ),
            None => {
                tracing::warn!("QDRANT_URL not set, using in-memory vector index");
                FaceIndex::in_memory()
            }
        };

        let fetch_timeout = Duration::from_secs(config.fetch_timeout_secs);

        let media = match config.media_upload_url.as_deref() {
            Some(url) => MediaStorage::Http(HttpMediaStore::new(url, fetch_timeout)?),
            None => {
                tracing::warn!("MEDIA_UPLOAD_URL not set, using in-memory media store");
                MediaStorage::in_memory()
            }
        };

        let engine: Arc<dyn FaceEngine> = match config.engine_url.as_deref() {
            Some(url) => {
                let mut engine_config = HttpFaceEngineConfig::new(url);
                engine_config.api_key = config.engine_api_key.clone();
                engine_config.timeout = fetch_timeout;
                Arc::new(HttpFaceEngine::new(engine_config)?)
            }
            None => {
                tracing::warn!(
                    "FACE_ENGINE_URL not set, using deterministic mock engine - \
                     development only"
                );
                Arc::new(MockFaceEngine::new())
            }
        };

        let jwks_cache = config
            .clerk_jwks_url
            .clone()
            .map(|url| Arc::new(JwksCache::new(url)));

        let pipeline = Arc::new(build_pipeline(&config, engine));

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(store),
            cache,
            index: Arc::new(index),
            media: Arc::new(media),
            pipeline,
            jwks_cache,
        })
    }

    /// Fully in-memory state with the deterministic mock engine.
    pub fn in_memory(config: Config) -> Self {
        Self::in_memory_with_engine(config, Arc::new(MockFaceEngine::new()))
    }

    /// Fully in-memory state with a caller-supplied engine (tests use this
    /// to substitute a no-face or instrumented mock).
    pub fn in_memory_with_engine(config: Config, engine: Arc<dyn FaceEngine>) -> Self {
        let pipeline = Arc::new(build_pipeline(&config, engine));
        let jwks_cache = config
            .clerk_jwks_url
            .clone()
            .map(|url| Arc::new(JwksCache::new(url)));

        Self {
            store: Arc::new(Store::in_memory(&config.case_id_prefix)),
            cache: CacheLayer::in_memory(),
            index: Arc::new(FaceIndex::in_memory()),
            media: Arc::new(MediaStorage::in_memory()),
            pipeline,
            jwks_cache,
            config: Arc::new(config),
        }
    }
}

fn build_pipeline(config: &Config, engine: Arc<dyn FaceEngine>) -> FacePipeline {
    let closeup = CloseupHeuristic {
        max_side: config.closeup_max_side,
        aspect_delta: config.closeup_aspect_delta,
        small_image_fallback: config.small_image_fallback,
    };
    FacePipeline::with_heuristic(engine, closeup, MIN_DETECTION_SCORE)
}
