//! Deterministic face engine for tests and local development.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use image::DynamicImage;
use sha3::{Digest, Sha3_256};

use super::{FaceDetection, FaceEngine};
use crate::embedding::{Embedding, EMBEDDING_DIM};
use crate::error::Result;

/// Mock face engine.
/// WARNING: Do not use in production - embeddings are derived from pixel
/// bytes, not from a recognition model!
///
/// Identical images always yield the identical embedding, so self-match
/// similarity is exactly 1.0 and cache behavior can be asserted on.
pub struct MockFaceEngine {
    find_faces: bool,
    embed_calls: AtomicUsize,
}

impl MockFaceEngine {
    pub fn new() -> Self {
        Self {
            find_faces: true,
            embed_calls: AtomicUsize::new(0),
        }
    }

    /// Engine that never finds a face, for exercising no-face paths.
    pub fn without_faces() -> Self {
        Self {
            find_faces: false,
            embed_calls: AtomicUsize::new(0),
        }
    }

    /// Number of embed calls served so far. Lets tests assert that cached
    /// embeddings short-circuit re-inference.
    pub fn embed_call_count(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Derive a unit embedding from the pixel buffer: SHA3 over the raw
    /// RGB bytes, expanded in counter mode to 512 components in [-1, 1].
    fn derive_embedding(face: &DynamicImage) -> Result<Embedding> {
        let rgb = face.to_rgb8();

        let mut seed_hasher = Sha3_256::new();
        seed_hasher.update(rgb.width().to_le_bytes());
        seed_hasher.update(rgb.height().to_le_bytes());
        seed_hasher.update(rgb.as_raw());
        let seed: [u8; 32] = seed_hasher.finalize().into();

        let mut components = Vec::with_capacity(EMBEDDING_DIM);
        let mut counter: u32 = 0;
        while components.len() < EMBEDDING_DIM {
            let mut hasher = Sha3_256::new();
            hasher.update(seed);
            hasher.update(counter.to_le_bytes());
            let block = hasher.finalize();

            for chunk in block.chunks_exact(4) {
                if components.len() == EMBEDDING_DIM {
                    break;
                }
                let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                components.push(word as f32 / u32::MAX as f32 * 2.0 - 1.0);
            }
            counter += 1;
        }

        Embedding::from_raw(components)
    }
}

impl Default for MockFaceEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FaceEngine for MockFaceEngine {
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceDetection>> {
        if !self.find_faces {
            return Ok(Vec::new());
        }

        // One high-confidence detection covering the central 60% of the
        // image, so identical inputs always produce identical crops.
        let (w, h) = (i64::from(image.width()), i64::from(image.height()));
        let bw = (w * 3 / 5).max(1);
        let bh = (h * 3 / 5).max(1);

        Ok(vec![FaceDetection {
            x: (w - bw) / 2,
            y: (h - bh) / 2,
            width: bw,
            height: bh,
            score: 0.99,
        }])
    }

    async fn embed(&self, face: &DynamicImage) -> Result<Embedding> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Self::derive_embedding(face)
    }

    fn engine_id(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image(seed: u8) -> DynamicImage {
        let img = image::RgbImage::from_fn(64, 64, |x, y| {
            image::Rgb([seed, (x % 251) as u8, (y % 241) as u8])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[tokio::test]
    async fn test_embedding_is_deterministic() {
        let engine = MockFaceEngine::new();
        let a = engine.embed(&test_image(7)).await.unwrap();
        let b = engine.embed(&test_image(7)).await.unwrap();
        assert_eq!(a, b);
        assert!((a.cosine_similarity(&b) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_different_images_produce_different_embeddings() {
        let engine = MockFaceEngine::new();
        let a = engine.embed(&test_image(1)).await.unwrap();
        let b = engine.embed(&test_image(2)).await.unwrap();
        assert_ne!(a, b);
        // Independent 512-d directions are nowhere near a face match.
        assert!(a.cosine_similarity(&b) < 0.5);
    }

    #[tokio::test]
    async fn test_embedding_is_unit_norm() {
        let engine = MockFaceEngine::new();
        let e = engine.embed(&test_image(9)).await.unwrap();
        let norm: f32 = e.as_slice().iter().map(|c| c * c).sum();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_detection_is_centered_and_scored() {
        let engine = MockFaceEngine::new();
        let detections = engine.detect(&test_image(3)).await.unwrap();
        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert!(d.score > 0.9);
        assert!(d.x >= 0 && d.y >= 0);
        assert!(d.width > 0 && d.height > 0);
    }

    #[tokio::test]
    async fn test_without_faces_detects_nothing() {
        let engine = MockFaceEngine::without_faces();
        let detections = engine.detect(&test_image(3)).await.unwrap();
        assert!(detections.is_empty());
    }

    #[tokio::test]
    async fn test_embed_call_counter() {
        let engine = MockFaceEngine::new();
        assert_eq!(engine.embed_call_count(), 0);
        engine.embed(&test_image(1)).await.unwrap();
        engine.embed(&test_image(1)).await.unwrap();
        assert_eq!(engine.embed_call_count(), 2);
    }
}
