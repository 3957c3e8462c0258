//! Health check handlers
//!
//! Provides health and readiness endpoints for monitoring and
//! orchestration.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status: "healthy" or "degraded"
    pub status: &'static str,
    /// Server version from Cargo.toml
    pub version: &'static str,
    /// Service name
    pub service: &'static str,
    /// Relational store backend in use
    pub store_backend: &'static str,
    /// Cache backend in use
    pub cache_backend: &'static str,
    /// Vector index backend in use
    pub index_backend: &'static str,
    /// Face engine in use
    pub engine: &'static str,
}

/// GET /health - Health check endpoint
///
/// Reports which backend each component is running on and pings the
/// relational store. Used for monitoring and load balancer health checks.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_ok = state.store.check_health().await.is_ok();

    let status = if store_ok { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        service: "reunite-server",
        store_backend: state.store.kind(),
        cache_backend: state.cache.kind(),
        index_backend: state.index.kind(),
        engine: state.pipeline.engine_id(),
    })
}

/// Readiness response for orchestration probes
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    pub ready: bool,
    /// Optional message explaining status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// GET /ready - readiness probe
///
/// Returns 200 if the service is ready to accept traffic. Unlike /health,
/// this is a simple yes/no check.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses((status = 200, description = "Readiness", body = ReadyResponse))
)]
pub async fn ready() -> Json<ReadyResponse> {
    Json(ReadyResponse {
        ready: true,
        message: None,
    })
}
