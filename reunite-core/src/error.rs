use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, FaceError>;
