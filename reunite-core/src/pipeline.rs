//! Face extraction pipeline: image bytes -> best face crop -> embedding.
//!
//! Handles both full photographs and pre-cropped face images. A small,
//! roughly square image is passed through untransformed; otherwise the
//! highest-scoring detection wins. Multiple faces in one image are not
//! disambiguated.

use std::sync::Arc;

use image::DynamicImage;

use crate::embedding::Embedding;
use crate::engine::{FaceDetection, FaceEngine};
use crate::error::{FaceError, Result};

/// Tunable thresholds for the pre-cropped passthrough heuristic.
#[derive(Debug, Clone)]
pub struct CloseupHeuristic {
    /// Maximum side length for an image to count as a face crop.
    pub max_side: u32,
    /// Maximum |width - height| for an image to count as a face crop.
    pub aspect_delta: u32,
    /// Below this size, an image with no detections is embedded as-is.
    pub small_image_fallback: u32,
}

impl Default for CloseupHeuristic {
    fn default() -> Self {
        Self {
            max_side: 300,
            aspect_delta: 50,
            small_image_fallback: 400,
        }
    }
}

impl CloseupHeuristic {
    fn is_closeup(&self, image: &DynamicImage) -> bool {
        let (w, h) = (image.width(), image.height());
        w <= self.max_side && h <= self.max_side && w.abs_diff(h) < self.aspect_delta
    }

    fn is_small(&self, image: &DynamicImage) -> bool {
        image.width() < self.small_image_fallback && image.height() < self.small_image_fallback
    }
}

/// Detect -> crop -> embed orchestration around a [`FaceEngine`].
pub struct FacePipeline {
    engine: Arc<dyn FaceEngine>,
    closeup: CloseupHeuristic,
    /// Detections scoring below this are ignored.
    min_detection_score: f32,
}

impl FacePipeline {
    pub fn new(engine: Arc<dyn FaceEngine>) -> Self {
        Self::with_heuristic(engine, CloseupHeuristic::default(), 0.3)
    }

    pub fn with_heuristic(
        engine: Arc<dyn FaceEngine>,
        closeup: CloseupHeuristic,
        min_detection_score: f32,
    ) -> Self {
        Self {
            engine,
            closeup,
            min_detection_score,
        }
    }

    pub fn engine_id(&self) -> &'static str {
        self.engine.engine_id()
    }

    /// Decode raw bytes into an image.
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| FaceError::InvalidImage(e.to_string()))
    }

    /// Select the face crop to embed, or `None` when the image has no
    /// usable face.
    async fn extract_face(&self, image: &DynamicImage) -> Result<Option<DynamicImage>> {
        if self.closeup.is_closeup(image) {
            tracing::debug!(
                width = image.width(),
                height = image.height(),
                "treating image as pre-cropped face"
            );
            return Ok(Some(image.clone()));
        }

        let mut detections = self.engine.detect(image).await?;
        detections.retain(|d| d.score >= self.min_detection_score);
        tracing::debug!(count = detections.len(), "face detections");

        let best = detections
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score));

        let Some(best) = best else {
            if self.closeup.is_small(image) {
                tracing::debug!("no detection on small image, embedding as-is");
                return Ok(Some(image.clone()));
            }
            return Ok(None);
        };

        Ok(clamp_crop(image, &best))
    }

    /// Full pipeline: best face crop -> embedding. `Ok(None)` means no
    /// face was found; errors are reserved for real faults.
    pub async fn extract_embedding(&self, image: &DynamicImage) -> Result<Option<Embedding>> {
        let Some(face) = self.extract_face(image).await? else {
            return Ok(None);
        };
        let embedding = self.engine.embed(&face).await?;
        Ok(Some(embedding))
    }
}

/// Clamp a detection box to the image bounds and crop.
/// Degenerate boxes (fully outside the image) yield `None`.
fn clamp_crop(image: &DynamicImage, detection: &FaceDetection) -> Option<DynamicImage> {
    let (iw, ih) = (i64::from(image.width()), i64::from(image.height()));

    let x1 = detection.x.max(0);
    let y1 = detection.y.max(0);
    let x2 = detection.x.saturating_add(detection.width).min(iw);
    let y2 = detection.y.saturating_add(detection.height).min(ih);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(image.crop_imm(x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32))
}
