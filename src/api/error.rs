//! API error types for the Insight client.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when interacting with the Insight API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed - invalid credentials or token.
    #[error("Authentication failed: check your credentials or API token")]
    Unauthorized,

    /// Permission denied - user lacks access to the resource.
    #[error("Permission denied: you don't have access to this resource")]
    Forbidden,

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Rate limited by the Insight API.
    ///
    /// Carries the server's `Retry-After` hint when one was sent.
    #[error("Rate limited: please wait before retrying")]
    RateLimited(Option<Duration>),

    /// Insight server error.
    #[error("Insight server error: {0}")]
    ServerError(String),

    /// The API rejected the request with a status we do not map explicitly.
    #[error("Unexpected HTTP {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// Conflict with the current state of the resource.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Network or HTTP error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Keyring error when storing/retrieving secrets.
    #[error("Keyring error: {0}")]
    Keyring(String),

    /// Invalid response from the API.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Connection validation failed.
    #[error("Connection validation failed: {0}")]
    ConnectionFailed(String),

    /// Client options that cannot be used to build a client.
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    /// The operation is not available on this deployment type.
    #[error("Not supported on {0}")]
    Unsupported(&'static str),

    /// A page of a paginated query could not be fetched.
    #[error("Failed to fetch page {page}: {source}")]
    PageFetch {
        page: u32,
        #[source]
        source: Box<ApiError>,
    },

    /// Local file error (attachment uploads).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Create an error from an HTTP status code.
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden,
            404 => ApiError::NotFound(context.to_string()),
            409 => ApiError::Conflict(context.to_string()),
            429 => ApiError::RateLimited(None),
            500..=599 => ApiError::ServerError(format!("HTTP {}: {}", status, context)),
            code => ApiError::UnexpectedStatus {
                status: code,
                message: context.to_string(),
            },
        }
    }

    /// Wrap an error raised while fetching one page of a paginated query.
    pub fn page_fetch(page: u32, source: ApiError) -> Self {
        ApiError::PageFetch {
            page,
            source: Box::new(source),
        }
    }

    /// The page number, if this error came out of pagination.
    pub fn failed_page(&self) -> Option<u32> {
        match self {
            ApiError::PageFetch { page, .. } => Some(*page),
            _ => None,
        }
    }
}
