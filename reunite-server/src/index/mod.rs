//! Vector index adapter.
//!
//! Holds at most one vector per verified person, keyed by person id.
//! Search is cosine similarity over unit vectors restricted to payloads
//! carrying `verified = true`; upsert replaces any existing vector under
//! the same id.

mod memory;
mod qdrant;

pub use memory::MemoryFaceIndex;
pub use qdrant::QdrantFaceIndex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use reunite_core::{Embedding, EMBEDDING_DIM};

/// Errors from the vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Vector index connection error: {0}")]
    Connection(String),

    #[error("Vector index query error: {0}")]
    Query(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Payload attached to every indexed face vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacePayload {
    pub person_id: String,
    pub verified: bool,
    pub image_url: String,
}

impl FacePayload {
    pub fn new(person_id: Uuid, image_url: impl Into<String>) -> Self {
        Self {
            person_id: person_id.to_string(),
            verified: true,
            image_url: image_url.into(),
        }
    }
}

/// One nearest-neighbor hit: similarity score plus the raw payload.
///
/// The payload stays untyped here because legacy index entries carry
/// alternate key names; [`person_id_from_payload`] resolves them.
#[derive(Debug, Clone)]
pub struct FaceHit {
    pub score: f32,
    pub payload: serde_json::Value,
}

/// Decode the person id out of an index payload.
///
/// Tries the known field names in fixed priority order (`person_id`, `id`,
/// `personId`) and returns `None` for anything unresolvable - shape drift
/// in old entries degrades that hit, never the request.
pub fn person_id_from_payload(payload: &serde_json::Value) -> Option<Uuid> {
    ["person_id", "id", "personId"].iter().find_map(|key| {
        payload
            .get(*key)
            .and_then(|value| value.as_str())
            .and_then(|raw| Uuid::parse_str(raw).ok())
    })
}

/// Vector index backend.
pub enum FaceIndex {
    /// Qdrant storage (production)
    Qdrant(QdrantFaceIndex),
    /// In-memory storage (development fallback and tests)
    Memory(MemoryFaceIndex),
}

impl FaceIndex {
    pub fn in_memory() -> Self {
        Self::Memory(MemoryFaceIndex::new())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Qdrant(_) => "qdrant",
            Self::Memory(_) => "memory",
        }
    }

    /// Top-k nearest vectors among verified payloads, best first.
    pub async fn search(
        &self,
        embedding: &Embedding,
        top_k: usize,
    ) -> Result<Vec<FaceHit>, IndexError> {
        check_dimension(embedding)?;
        match self {
            Self::Qdrant(qdrant) => qdrant.search(embedding, top_k).await,
            Self::Memory(memory) => Ok(memory.search(embedding, top_k)),
        }
    }

    /// Insert or replace the vector stored under a person id.
    pub async fn upsert(
        &self,
        person_id: Uuid,
        embedding: &Embedding,
        payload: &FacePayload,
    ) -> Result<(), IndexError> {
        check_dimension(embedding)?;
        match self {
            Self::Qdrant(qdrant) => qdrant.upsert(person_id, embedding, payload).await,
            Self::Memory(memory) => memory.upsert(person_id, embedding, payload),
        }
    }
}

fn check_dimension(embedding: &Embedding) -> Result<(), IndexError> {
    if embedding.len() != EMBEDDING_DIM {
        return Err(IndexError::DimensionMismatch {
            expected: EMBEDDING_DIM,
            actual: embedding.len(),
        });
    }
    Ok(())
}
