//! HTTP-backed face engine client.
//!
//! Talks to a remote inference service exposing `POST /detect` and
//! `POST /embed`, both taking a base64-encoded image and returning JSON.
//! Transient failures (timeouts, connect errors, 429/5xx) are retried with
//! exponential backoff; everything else surfaces immediately.

use std::io::Cursor;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::DynamicImage;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{FaceDetection, FaceEngine};
use crate::embedding::Embedding;
use crate::error::{FaceError, Result};

/// Configuration for the remote inference service.
#[derive(Clone)]
pub struct HttpFaceEngineConfig {
    /// Service base URL, e.g. `https://inference.internal/v1`.
    pub base_url: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient failures.
    pub max_retries: u32,
}

impl std::fmt::Debug for HttpFaceEngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFaceEngineConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl HttpFaceEngineConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }
}

/// Face engine backed by a remote inference service.
pub struct HttpFaceEngine {
    client: Client,
    config: HttpFaceEngineConfig,
}

/// Request body shared by both endpoints: base64-encoded PNG.
#[derive(Debug, Serialize)]
struct InferenceRequest {
    image: String,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    faces: Vec<WireDetection>,
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    x: i64,
    y: i64,
    width: i64,
    height: i64,
    score: f32,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl HttpFaceEngine {
    pub fn new(config: HttpFaceEngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FaceError::Engine(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Encode an image as base64 PNG for the wire.
    fn encode_png(image: &DynamicImage) -> Result<String> {
        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, image::ImageFormat::Png)
            .map_err(|e| FaceError::InvalidImage(format!("PNG encode failed: {e}")))?;
        Ok(BASE64.encode(buf.into_inner()))
    }

    /// Single attempt against one endpoint, classified for retry.
    async fn post_once<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &InferenceRequest,
    ) -> std::result::Result<T, backoff::Error<FaceError>> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let start = Instant::now();

        let mut request = self.client.post(&url).json(body);
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis();
            warn!(error = %e, latency_ms = latency_ms as u64, path, "Engine request failed");
            if is_transient_error(&e) {
                backoff::Error::transient(FaceError::Engine(format!(
                    "Transient error (will retry): {e}"
                )))
            } else {
                backoff::Error::permanent(FaceError::Engine(format!("Request failed: {e}")))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let err = FaceError::Engine(format!("Engine returned status: {status}"));
            return if is_transient_status(status) {
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            };
        }

        let parsed = response.json().await.map_err(|e| {
            backoff::Error::permanent(FaceError::Engine(format!(
                "Failed to parse engine response: {e}"
            )))
        })?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            path, "Engine call succeeded"
        );
        Ok(parsed)
    }

    async fn post_with_retry<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &InferenceRequest,
    ) -> Result<T> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries),
            ..Default::default()
        };

        retry_notify(
            backoff,
            || async { self.post_once(path, body).await },
            |err: FaceError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    path,
                    "Retry scheduled"
                );
            },
        )
        .await
    }
}

#[async_trait]
impl FaceEngine for HttpFaceEngine {
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceDetection>> {
        let body = InferenceRequest {
            image: Self::encode_png(image)?,
        };
        let response: DetectResponse = self.post_with_retry("detect", &body).await?;

        Ok(response
            .faces
            .into_iter()
            .map(|face| FaceDetection {
                x: face.x,
                y: face.y,
                width: face.width,
                height: face.height,
                score: face.score,
            })
            .collect())
    }

    async fn embed(&self, face: &DynamicImage) -> Result<Embedding> {
        let body = InferenceRequest {
            image: Self::encode_png(face)?,
        };
        let response: EmbedResponse = self.post_with_retry("embed", &body).await?;
        Embedding::from_raw(response.embedding)
    }

    fn engine_id(&self) -> &'static str {
        "http"
    }
}

/// Network-level failures worth retrying.
fn is_transient_error(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}

/// HTTP statuses worth retrying.
fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
