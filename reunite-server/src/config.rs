//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible
//! defaults. `Default` is tuned for tests (everything in-memory, rate
//! limiting off); `from_env()` is what the binary uses.

use std::net::SocketAddr;
use std::str::FromStr;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 50)
    pub body_limit_mb: usize,
    /// Maximum file size per upload in MB (default: 25)
    pub max_file_size_mb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// PostgreSQL connection string; in-memory store when unset
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 20)
    pub database_max_connections: u32,
    /// Redis connection string; in-memory cache when unset
    pub redis_url: Option<String>,
    /// Qdrant endpoint; in-memory vector index when unset
    pub qdrant_url: Option<String>,
    /// Qdrant API key
    pub qdrant_api_key: Option<String>,
    /// Qdrant collection holding one vector per verified person
    pub qdrant_collection: String,
    /// Face engine inference service endpoint; mock engine when unset
    pub engine_url: Option<String>,
    /// Face engine API key
    pub engine_api_key: Option<String>,
    /// Media upload endpoint; in-memory media store when unset
    pub media_upload_url: Option<String>,
    /// Clerk JWKS URL for JWT validation (enables JWT admin auth when set)
    pub clerk_jwks_url: Option<String>,
    /// Static admin token accepted via the `x-admin-token` header
    pub admin_token: Option<String>,
    /// Minimum cosine similarity for a search hit to count as a match
    pub similarity_threshold: f32,
    /// Number of nearest neighbors requested per search
    pub top_k: usize,
    /// Case id prefix; suffix is a 4-digit zero-padded counter
    pub case_id_prefix: String,
    /// Timeout for outbound media fetches/uploads in seconds (default: 10)
    pub fetch_timeout_secs: u64,
    /// Close-up passthrough: maximum side length of a pre-cropped face
    pub closeup_max_side: u32,
    /// Close-up passthrough: maximum |width - height|
    pub closeup_aspect_delta: u32,
    /// No-detection fallback: images below this size are embedded as-is
    pub small_image_fallback: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 50,
            max_file_size_mb: 25,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: None,
            database_max_connections: 20,
            redis_url: None,
            qdrant_url: None,
            qdrant_api_key: None,
            qdrant_collection: "faces_collection".to_string(),
            engine_url: None,
            engine_api_key: None,
            media_upload_url: None,
            clerk_jwks_url: None,
            admin_token: None,
            similarity_threshold: 0.55,
            top_k: 5,
            case_id_prefix: "MP2024".to_string(),
            fetch_timeout_secs: 10,
            closeup_max_side: 300,
            closeup_aspect_delta: 50,
            small_image_fallback: 400,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or([127, 0, 0, 1]);

        let allowed_origins = env_opt("ALLOWED_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled
        // with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let clerk_jwks_url = env_opt("CLERK_JWKS_URL")
            .or_else(|| env_opt("CLERK_ISSUER").and_then(|issuer| jwks_url_from_issuer(&issuer)));

        Self {
            port: env_parse("PORT", defaults.port),
            host,
            allowed_origins,
            body_limit_mb: env_parse("BODY_LIMIT_MB", defaults.body_limit_mb),
            max_file_size_mb: env_parse("MAX_FILE_SIZE_MB", defaults.max_file_size_mb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC", defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            database_url: env_opt("DATABASE_URL"),
            database_max_connections: env_parse(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            redis_url: env_opt("REDIS_URL"),
            qdrant_url: env_opt("QDRANT_URL"),
            qdrant_api_key: env_opt("QDRANT_API_KEY"),
            qdrant_collection: env_opt("QDRANT_COLLECTION")
                .unwrap_or(defaults.qdrant_collection),
            engine_url: env_opt("FACE_ENGINE_URL"),
            engine_api_key: env_opt("FACE_ENGINE_API_KEY"),
            media_upload_url: env_opt("MEDIA_UPLOAD_URL"),
            clerk_jwks_url,
            admin_token: env_opt("ADMIN_TOKEN"),
            similarity_threshold: env_parse(
                "SIMILARITY_THRESHOLD",
                defaults.similarity_threshold,
            ),
            top_k: env_parse("TOP_K", defaults.top_k),
            case_id_prefix: env_opt("CASE_ID_PREFIX").unwrap_or(defaults.case_id_prefix),
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS", defaults.fetch_timeout_secs),
            closeup_max_side: env_parse("CLOSEUP_MAX_SIDE", defaults.closeup_max_side),
            closeup_aspect_delta: env_parse(
                "CLOSEUP_ASPECT_DELTA",
                defaults.closeup_aspect_delta,
            ),
            small_image_fallback: env_parse(
                "SMALL_IMAGE_FALLBACK",
                defaults.small_image_fallback,
            ),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Derive the JWKS URL from an issuer base URL.
///
/// Matches the issuer's well-known layout: `<issuer>/.well-known/jwks.json`.
fn jwks_url_from_issuer(issuer: &str) -> Option<String> {
    let trimmed = issuer.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let url = format!("{trimmed}/.well-known/jwks.json");
    tracing::info!("Derived JWKS URL from issuer: {url}");
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.similarity_threshold, 0.55);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.case_id_prefix, "MP2024");
        assert_eq!(config.qdrant_collection, "faces_collection");
        assert!(!config.rate_limit_enabled);
        assert!(config.database_url.is_none());
        assert!(config.admin_token.is_none());
    }

    #[test]
    fn test_jwks_url_from_issuer() {
        assert_eq!(
            jwks_url_from_issuer("https://example.clerk.accounts.dev/").unwrap(),
            "https://example.clerk.accounts.dev/.well-known/jwks.json"
        );
        assert_eq!(
            jwks_url_from_issuer("https://example.clerk.accounts.dev").unwrap(),
            "https://example.clerk.accounts.dev/.well-known/jwks.json"
        );
        assert!(jwks_url_from_issuer("").is_none());
        assert!(jwks_url_from_issuer("   ").is_none());
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::default();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
    }
}
