//! Face embedding type, similarity math, and cache-key derivation.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::error::{FaceError, Result};

/// Embedding dimension produced by the recognition model.
pub const EMBEDDING_DIM: usize = 512;

/// Decimal places kept when fingerprinting an embedding. Components that
/// differ only below this precision collapse to the same cache key.
const FINGERPRINT_PRECISION: usize = 5;

/// L2-normalized face embedding.
///
/// Unit norm is an invariant of this type: cosine similarity between two
/// embeddings reduces to their dot product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Build an embedding from raw model output, normalizing to unit length.
    pub fn from_raw(components: Vec<f32>) -> Result<Self> {
        if components.len() != EMBEDDING_DIM {
            return Err(FaceError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: components.len(),
            });
        }

        let norm = components.iter().map(|c| c * c).sum::<f32>().sqrt();
        if !norm.is_finite() || norm == 0.0 {
            return Err(FaceError::Engine(
                "embedding has zero or non-finite norm".into(),
            ));
        }

        Ok(Self(components.into_iter().map(|c| c / norm).collect()))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.0.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cosine similarity in [-1, 1]. Both sides are unit vectors, so this
    /// is an inner product.
    pub fn cosine_similarity(&self, other: &Self) -> f32 {
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }

    /// Stable cache key for this embedding.
    ///
    /// Components are rounded to a fixed decimal precision before hashing,
    /// so floating-point jitter from re-running the model on identical
    /// input maps to the same key.
    pub fn fingerprint(&self) -> String {
        let joined = self
            .0
            .iter()
            .map(|c| format!("{c:.prec$}", prec = FINGERPRINT_PRECISION))
            .collect::<Vec<_>>()
            .join(",");

        let mut hasher = Sha3_256::new();
        hasher.update(joined.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// SHA3-256 content hash of raw image bytes, hex encoded.
///
/// Content-addressed: identical bytes always produce the identical hash, so
/// embedding cache entries are safe to share across callers.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
