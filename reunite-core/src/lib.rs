//! ReUnite Core - face embedding primitives for the missing-person search
//! service.
//!
//! This crate provides everything the HTTP service needs to turn an image
//! into a searchable face embedding:
//!
//! - A fixed-dimension, unit-normalized [`Embedding`] type where cosine
//!   similarity is a dot product
//! - Content hashing and embedding fingerprinting for cache keys
//! - The [`FaceEngine`] abstraction over external detection/recognition
//!   models, with an HTTP client and a deterministic mock
//! - The [`FacePipeline`] that selects the best face region (or passes a
//!   pre-cropped close-up through untouched) and embeds it
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use reunite_core::{FacePipeline, MockFaceEngine};
//!
//! # async fn example() -> reunite_core::Result<()> {
//! let pipeline = FacePipeline::new(Arc::new(MockFaceEngine::new()));
//!
//! let bytes = std::fs::read("photo.jpg").expect("readable file");
//! let image = FacePipeline::decode(&bytes)?;
//!
//! match pipeline.extract_embedding(&image).await? {
//!     Some(embedding) => println!("fingerprint: {}", embedding.fingerprint()),
//!     None => println!("no face found"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod embedding;
pub mod engine;
pub mod error;
pub mod pipeline;

// Re-export main types for convenience
pub use embedding::{content_hash, Embedding, EMBEDDING_DIM};
pub use engine::{
    FaceDetection, FaceEngine, HttpFaceEngine, HttpFaceEngineConfig, MockFaceEngine,
};
pub use error::{FaceError, Result};
pub use pipeline::{CloseupHeuristic, FacePipeline};
