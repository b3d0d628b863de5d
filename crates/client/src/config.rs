//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `STORE_API_BASE` - Backend base URL (default: `http://localhost:5000`)
//! - `STORE_API_AUTH_PATH` - Auth routes prefix (default: `/auth`)
//! - `STORE_API_PROFILE_PATH` - Profile route (default: `/auth/profile`)
//! - `STORE_API_PRODUCTS_PATH` - Products route (default: `/products`)
//! - `STORE_API_ORDERS_PATH` - Orders routes prefix (default: `/orders`)
//! - `STORE_API_MONERO_PATH` - Monero routes prefix (default: `/monero`)
//! - `STORE_API_CHECKOUT_PATH` - Checkout route (default: `/monero/checkout`)
//! - `STORE_API_HEALTH_PATH` - Health route (default: `/health`)
//! - `STORE_DATA_DIR` - Durable storage directory (default: `.secure-store`)
//! - `STORE_SESSION_TIMEOUT_SECS` - Session storage idle expiry (default: 86400)
//! - `STORE_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 30)
//! - `STORE_TOKEN_REFRESH_WINDOW_SECS` - Refresh tokens expiring within this window (default: 300)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE: &str = "http://localhost:5000";
const DEFAULT_DATA_DIR: &str = ".secure-store";
const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 3600 * 24;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REFRESH_WINDOW_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend endpoints
    pub api: ApiConfig,
    /// Local persistence settings
    pub storage: StorageConfig,
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
    /// Tokens expiring within this window are refreshed
    pub token_refresh_window: Duration,
}

/// Backend REST endpoints.
///
/// Paths are joined onto `base`; a path that is already an absolute URL is
/// used as-is.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Backend base URL
    pub base: Url,
    /// Auth routes prefix (`<auth>/login`, `<auth>/register`, `<auth>/refresh`)
    pub auth: String,
    /// Profile route
    pub profile: String,
    /// Products route
    pub products: String,
    /// Orders routes prefix
    pub orders: String,
    /// Monero routes prefix
    pub monero: String,
    /// Checkout route
    pub checkout: String,
    /// Health route
    pub health: String,
}

/// Settings for the two persistence namespaces.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the durable namespace
    pub data_dir: PathBuf,
    /// Idle expiry for the session-scoped namespace
    pub session_timeout: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            api: ApiConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            request_timeout: get_secs_or_default(
                "STORE_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            token_refresh_window: get_secs_or_default(
                "STORE_TOKEN_REFRESH_WINDOW_SECS",
                DEFAULT_REFRESH_WINDOW_SECS,
            )?,
        })
    }

    /// Configuration pointing at `base` with every other setting defaulted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `base` is not a valid URL.
    pub fn with_base_url(base: &str, data_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Ok(Self {
            api: ApiConfig::with_base(parse_base_url("STORE_API_BASE", base)?),
            storage: StorageConfig {
                data_dir: data_dir.into(),
                session_timeout: Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS),
            },
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            token_refresh_window: Duration::from_secs(DEFAULT_REFRESH_WINDOW_SECS),
        })
    }
}

impl ApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base = parse_base_url(
            "STORE_API_BASE",
            &get_env_or_default("STORE_API_BASE", DEFAULT_API_BASE),
        )?;

        Ok(Self {
            base,
            auth: get_env_or_default("STORE_API_AUTH_PATH", "/auth"),
            profile: get_env_or_default("STORE_API_PROFILE_PATH", "/auth/profile"),
            products: get_env_or_default("STORE_API_PRODUCTS_PATH", "/products"),
            orders: get_env_or_default("STORE_API_ORDERS_PATH", "/orders"),
            monero: get_env_or_default("STORE_API_MONERO_PATH", "/monero"),
            checkout: get_env_or_default("STORE_API_CHECKOUT_PATH", "/monero/checkout"),
            health: get_env_or_default("STORE_API_HEALTH_PATH", "/health"),
        })
    }

    /// Default route layout on top of `base`.
    #[must_use]
    pub fn with_base(base: Url) -> Self {
        Self {
            base,
            auth: "/auth".to_string(),
            profile: "/auth/profile".to_string(),
            products: "/products".to_string(),
            orders: "/orders".to_string(),
            monero: "/monero".to_string(),
            checkout: "/monero/checkout".to_string(),
            health: "/health".to_string(),
        }
    }

    /// Resolve an endpoint against the base URL.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the resulting URL is invalid.
    pub fn resolve(&self, endpoint: &str) -> Result<Url, url::ParseError> {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return Url::parse(endpoint);
        }

        let base = self.base.as_str().trim_end_matches('/');
        if endpoint.starts_with('/') {
            Url::parse(&format!("{base}{endpoint}"))
        } else {
            Url::parse(&format!("{base}/{endpoint}"))
        }
    }
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            data_dir: PathBuf::from(get_env_or_default("STORE_DATA_DIR", DEFAULT_DATA_DIR)),
            session_timeout: get_secs_or_default(
                "STORE_SESSION_TIMEOUT_SECS",
                DEFAULT_SESSION_TIMEOUT_SECS,
            )?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Get a duration in whole seconds with a default value.
fn get_secs_or_default(key: &str, default: u64) -> Result<Duration, ConfigError> {
    get_optional_env(key).map_or(Ok(Duration::from_secs(default)), |value| {
        value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse and validate an http(s) base URL.
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    Ok(url)
}
