//! Error types for the client state layer.
//!
//! Every public operation returns either a value or one of these errors;
//! nothing in this crate panics on a backend or storage failure.
//!
//! | Condition                          | Surface                              |
//! |------------------------------------|--------------------------------------|
//! | 401 through the gateway            | [`ApiError::SessionExpired`]         |
//! | Profile/token check rejected       | `check_auth` returns `false`         |
//! | Transport failure or timeout       | [`ApiError::Network`]                |
//! | Malformed cart input               | ignored, no error                    |
//! | Storage read/write failure         | logged, never surfaced               |

use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StorageError;

/// Errors from calls to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend rejected the session (401). The session has been cleared.
    #[error("Session expired. Please login again.")]
    SessionExpired,

    /// The backend returned a non-success status.
    #[error("API request failed: {status} - {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Backend-provided message, or a status-derived one.
        message: String,
    },

    /// The request never produced a response.
    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),

    /// A response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The endpoint could not be turned into a URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A caller-supplied header was not valid.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl ApiError {
    /// HTTP status carried by the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::SessionExpired => Some(401),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend rejected the credentials.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// Whether repeating the request could succeed.
    ///
    /// Session expiry is never retryable; callers should send the user to
    /// the login screen instead.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::SessionExpired
            | Self::Decode(_)
            | Self::InvalidUrl(_)
            | Self::InvalidHeader(_) => false,
        }
    }
}

/// Errors creating the client state container.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The durable storage directory could not be opened.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
