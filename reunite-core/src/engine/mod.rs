//! Face engine abstraction.
//!
//! The detection and recognition models are external collaborators: the
//! service only depends on this trait, which turns an image into scored
//! face regions and a face crop into a fixed-length embedding.
//!
//! ## Implementations
//!
//! - [`HttpFaceEngine`] - remote inference service (production)
//! - [`MockFaceEngine`] - deterministic mock (testing and local development)

mod http;
mod mock;

pub use http::{HttpFaceEngine, HttpFaceEngineConfig};
pub use mock::MockFaceEngine;

use async_trait::async_trait;
use image::DynamicImage;

use crate::embedding::Embedding;
use crate::error::Result;

/// A detected face region with a confidence score.
///
/// Coordinates are in source-image pixels and may extend past the image
/// bounds; callers clamp before cropping.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDetection {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub score: f32,
}

/// Black-box face engine: detect regions, embed a face crop.
#[async_trait]
pub trait FaceEngine: Send + Sync {
    /// Detect face regions in an image. May return an empty list.
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceDetection>>;

    /// Compute an embedding for a face crop.
    async fn embed(&self, face: &DynamicImage) -> Result<Embedding>;

    /// Engine identifier for logging and health reporting.
    fn engine_id(&self) -> &'static str;
}
