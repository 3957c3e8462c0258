//! Media storage adapter: durable image hosting plus retrieval.
//!
//! The service only needs two operations from its object store: upload
//! bytes for a stable URL, and fetch bytes back by URL at approval time.
//! Both carry bounded timeouts; upload fails closed.
//!
//! Backends:
//! - **HTTP** (production): Cloudinary-style unsigned upload endpoint
//!   returning `secure_url`/`url` in its JSON response.
//! - **In-memory** (development fallback and tests): content-addressed
//!   `memory://` URLs.

use std::time::Duration;

use dashmap::DashMap;
use serde::Deserialize;
use thiserror::Error;

use reunite_core::content_hash;

const MEMORY_URL_SCHEME: &str = "memory://";

/// Errors from the media store.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Media not found: {0}")]
    NotFound(String),
}

/// HTTP-backed media store.
pub struct HttpMediaStore {
    client: reqwest::Client,
    upload_url: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

impl HttpMediaStore {
    pub fn new(upload_url: impl Into<String>, timeout: Duration) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediaError::Upload(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            upload_url: upload_url.into(),
        })
    }

    async fn upload(&self, bytes: Vec<u8>) -> Result<String, MediaError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name("upload");
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| MediaError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MediaError::Upload(format!(
                "upload endpoint returned status {}",
                response.status()
            )));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| MediaError::Upload(format!("invalid upload response: {e}")))?;

        body.secure_url
            .or(body.url)
            .ok_or_else(|| MediaError::Upload("upload response missing url".into()))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MediaError::Fetch(format!(
                "media endpoint returned status {}",
                response.status()
            )));
        }

        Ok(response
            .bytes()
            .await
            .map_err(|e| MediaError::Fetch(e.to_string()))?
            .to_vec())
    }
}

/// In-memory media store with content-addressed URLs.
#[derive(Default)]
pub struct MemoryMediaStore {
    objects: DashMap<String, Vec<u8>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
        }
    }

    fn upload(&self, bytes: Vec<u8>) -> String {
        let url = format!("{MEMORY_URL_SCHEME}{}", content_hash(&bytes));
        self.objects.insert(url.clone(), bytes);
        url
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        self.objects
            .get(url)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| MediaError::NotFound(url.to_string()))
    }
}

/// Media storage backend.
pub enum MediaStorage {
    /// HTTP upload endpoint (production)
    Http(HttpMediaStore),
    /// In-memory storage (development fallback and tests)
    Memory(MemoryMediaStore),
}

impl MediaStorage {
    pub fn in_memory() -> Self {
        Self::Memory(MemoryMediaStore::new())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Memory(_) => "memory",
        }
    }

    /// Upload image bytes, returning a stable URL. Fails closed.
    pub async fn upload(&self, bytes: Vec<u8>) -> Result<String, MediaError> {
        match self {
            Self::Http(http) => http.upload(bytes).await,
            Self::Memory(memory) => Ok(memory.upload(bytes)),
        }
    }

    /// Fetch image bytes back by URL.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        match self {
            Self::Http(http) => http.fetch(url).await,
            Self::Memory(memory) => memory.fetch(url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_upload_fetch_roundtrip() {
        let store = MediaStorage::in_memory();
        let url = store.upload(vec![1, 2, 3, 4]).await.unwrap();
        assert!(url.starts_with(MEMORY_URL_SCHEME));
        assert_eq!(store.fetch(&url).await.unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_memory_upload_is_content_addressed() {
        let store = MediaStorage::in_memory();
        let a = store.upload(vec![1, 2, 3]).await.unwrap();
        let b = store.upload(vec![1, 2, 3]).await.unwrap();
        let c = store.upload(vec![9, 9, 9]).await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_memory_fetch_unknown_url() {
        let store = MediaStorage::in_memory();
        let err = store.fetch("memory://nope").await.unwrap_err();
        assert!(matches!(err, MediaError::NotFound(_)));
    }
}
