//! In-memory vector index.
//!
//! Brute-force dot-product scan over unit vectors. Development fallback
//! and test double; keeps the same verified-only filter semantics as the
//! Qdrant backend.

use dashmap::DashMap;
use uuid::Uuid;

use reunite_core::Embedding;

use super::{FaceHit, FacePayload, IndexError};

struct IndexedPoint {
    vector: Vec<f32>,
    payload: serde_json::Value,
}

/// In-memory face vector index.
#[derive(Default)]
pub struct MemoryFaceIndex {
    points: DashMap<Uuid, IndexedPoint>,
}

impl MemoryFaceIndex {
    pub fn new() -> Self {
        Self {
            points: DashMap::new(),
        }
    }

    pub fn search(&self, embedding: &Embedding, top_k: usize) -> Vec<FaceHit> {
        let query = embedding.as_slice();

        let mut hits: Vec<FaceHit> = self
            .points
            .iter()
            .filter(|entry| {
                entry
                    .payload
                    .get("verified")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false)
            })
            .map(|entry| FaceHit {
                score: dot(query, &entry.vector),
                payload: entry.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        hits
    }

    pub fn upsert(
        &self,
        person_id: Uuid,
        embedding: &Embedding,
        payload: &FacePayload,
    ) -> Result<(), IndexError> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| IndexError::Query(format!("payload serialization failed: {e}")))?;

        self.points.insert(
            person_id,
            IndexedPoint {
                vector: embedding.to_vec(),
                payload,
            },
        );
        Ok(())
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
