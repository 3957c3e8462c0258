//! Admin authentication module
//!
//! Provides the `AdminUser` extractor for Axum handlers. Two credential
//! paths satisfy it:
//!
//! - A static admin token via the `x-admin-token` header (development and
//!   tests), when one is configured.
//! - A bearer JWT validated against the issuer's JWKS endpoint, with the
//!   admin role read from the token's public metadata.
//!
//! JWKS keys are cached for one hour. Authorization runs before any other
//! processing on admin routes.

use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, jwk, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::ApiError;
use crate::state::AppState;

/// JWKS cache TTL (1 hour)
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Header carrying the static admin token.
const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// JWT claims from admin tokens
#[derive(Debug, Deserialize)]
struct AdminClaims {
    /// Subject (issuer-side user id)
    sub: String,
    /// Expiration time (validated by jsonwebtoken)
    #[allow(dead_code)]
    exp: u64,
    /// Public metadata carrying the role assignment
    #[serde(default)]
    public_metadata: Option<PublicMetadata>,
    /// Legacy top-level role claim
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetadata {
    #[serde(default)]
    role: Option<String>,
    #[serde(default, rename = "userRole")]
    user_role: Option<String>,
}

/// Resolve the role claim, tolerating the historical claim layouts.
/// Priority: public_metadata.role, public_metadata.userRole, top-level role.
fn admin_role(claims: &AdminClaims) -> Option<&str> {
    claims
        .public_metadata
        .as_ref()
        .and_then(|metadata| metadata.role.as_deref().or(metadata.user_role.as_deref()))
        .or(claims.role.as_deref())
}

/// Cached JWKS keys with timestamp
struct CachedJwks {
    keys: Vec<jwk::Jwk>,
    fetched_at: Instant,
}

/// JWKS cache that fetches and caches the issuer's JSON Web Key Set
pub struct JwksCache {
    keys: RwLock<Option<CachedJwks>>,
    jwks_url: String,
    http_client: reqwest::Client,
}

/// JWKS response structure
#[derive(Deserialize)]
struct JwksResponse {
    keys: Vec<jwk::Jwk>,
}

impl JwksCache {
    /// Create a new JWKS cache for the given JWKS URL
    pub fn new(jwks_url: String) -> Self {
        Self {
            keys: RwLock::new(None),
            jwks_url,
            http_client: reqwest::Client::new(),
        }
    }

    /// Get cached JWKS keys, fetching from the issuer if expired or not
    /// yet cached
    async fn get_keys(&self) -> Result<Vec<jwk::Jwk>, ApiError> {
        // Try read lock first (fast path)
        {
            let cache = self.keys.read().await;
            if let Some(ref cached) = *cache {
                if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                    return Ok(cached.keys.clone());
                }
            }
        }

        // Cache miss or expired - acquire write lock and fetch
        let mut cache = self.keys.write().await;

        // Double-check after acquiring write lock (another task may have
        // refreshed)
        if let Some(ref cached) = *cache {
            if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                return Ok(cached.keys.clone());
            }
        }

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to fetch JWKS from issuer");
                ApiError::internal("Authentication service temporarily unavailable")
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, "JWKS endpoint returned error");
            return Err(ApiError::internal(
                "Authentication service temporarily unavailable",
            ));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse JWKS response");
            ApiError::internal("Authentication service temporarily unavailable")
        })?;

        let keys = jwks.keys;
        tracing::info!(key_count = keys.len(), "Refreshed JWKS cache");

        *cache = Some(CachedJwks {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });

        Ok(keys)
    }

    /// Find a JWK by key ID
    async fn find_key(&self, kid: &str) -> Result<jwk::Jwk, ApiError> {
        let keys = self.get_keys().await?;
        keys.into_iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))
            .ok_or_else(|| {
                ApiError::auth_error(
                    "AUTH_UNKNOWN_KEY",
                    format!("No matching key found for kid '{}'", kid),
                )
            })
    }
}

/// Validate a JWT token and extract the admin claims.
///
/// This is the core validation logic, separated for testability.
async fn validate_jwt(token: &str, jwks_cache: &JwksCache) -> Result<AdminClaims, ApiError> {
    // Decode header to get kid
    let header = decode_header(token).map_err(|e| {
        ApiError::auth_error("AUTH_INVALID_TOKEN", format!("Invalid JWT header: {}", e))
    })?;

    let kid = header.kid.ok_or_else(|| {
        ApiError::auth_error("AUTH_INVALID_TOKEN", "JWT header missing 'kid' field")
    })?;

    // Find matching JWK
    let jwk = jwks_cache.find_key(&kid).await?;

    // Convert JWK to DecodingKey
    let decoding_key = DecodingKey::from_jwk(&jwk).map_err(|e| {
        tracing::error!(error = %e, kid = %kid, "Failed to convert JWK to decoding key");
        ApiError::auth_error("AUTH_INVALID_TOKEN", "Failed to process signing key")
    })?;

    // Validate JWT with RS256
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = true;
    // Issuer tokens don't always carry aud, so disable audience validation
    validation.validate_aud = false;

    let token_data =
        decode::<AdminClaims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ApiError::auth_error("AUTH_TOKEN_EXPIRED", "JWT token has expired")
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::auth_error("AUTH_INVALID_TOKEN", "Invalid JWT signature")
            }
            _ => ApiError::auth_error(
                "AUTH_INVALID_TOKEN",
                format!("JWT validation failed: {}", e),
            ),
        })?;

    Ok(token_data.claims)
}

/// Extract the Bearer token from the Authorization header
fn extract_bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| {
            ApiError::auth_error("AUTH_MISSING_TOKEN", "Missing Authorization header")
        })?;

    let auth_value = auth_header.to_str().map_err(|_| {
        ApiError::auth_error(
            "AUTH_INVALID_TOKEN",
            "Invalid Authorization header encoding",
        )
    })?;

    auth_value.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::auth_error(
            "AUTH_INVALID_TOKEN",
            "Authorization header must use Bearer scheme",
        )
    })
}

/// Authenticated admin extractor.
///
/// The extractor:
/// 1. Accepts the configured static token via `x-admin-token` (if set)
/// 2. Otherwise reads `Authorization: Bearer <token>`, validates it
///    against the issuer's JWKS, and requires the admin role
///
/// Returns 401 for missing/invalid credentials and 403 for a valid
/// non-admin principal.
pub struct AdminUser {
    /// Principal recorded as the reviewer on moderation decisions.
    pub subject: String,
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(expected) = state.config.admin_token.as_deref() {
            if let Some(provided) = parts
                .headers
                .get(ADMIN_TOKEN_HEADER)
                .and_then(|value| value.to_str().ok())
            {
                if provided == expected {
                    return Ok(AdminUser {
                        subject: "static-admin".to_string(),
                    });
                }
                return Err(ApiError::auth_error(
                    "AUTH_INVALID_TOKEN",
                    "Invalid admin token",
                ));
            }
        }

        let token = extract_bearer_token(parts)?;

        let jwks_cache = state.jwks_cache.as_ref().ok_or_else(|| {
            ApiError::service_unavailable("Admin authentication is not configured")
        })?;

        let claims = validate_jwt(token, jwks_cache).await?;

        match admin_role(&claims) {
            Some("admin") => Ok(AdminUser {
                subject: claims.sub,
            }),
            _ => Err(ApiError::forbidden("Not an admin")),
        }
    }
}
