//! Centralized error types for insight-client.
//!
//! This module provides a unified error hierarchy for the application with
//! user-friendly error messages. All error types use `thiserror` for
//! ergonomic error handling.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;

/// The main application error type.
///
/// Aggregates configuration and API errors, providing user-friendly
/// messages while preserving the underlying error for the log.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration-related errors.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// API-related errors.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// IO errors (file system, etc.).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with a message.
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Create a generic error.
    pub fn other(msg: impl Into<String>) -> Self {
        AppError::Other(msg.into())
    }

    /// Get a user-friendly message for display.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(e) => config_message(e),
            AppError::Api(e) => api_message(e),
            AppError::Io(_) => "A file operation failed. Please check file permissions.".to_string(),
            AppError::Other(msg) => msg.clone(),
        }
    }

    /// Check if this error is critical, meaning nothing will work until the
    /// configuration or credentials are fixed.
    pub fn is_critical(&self) -> bool {
        matches!(
            self.api_root_cause(),
            Some(ApiError::Unauthorized)
                | Some(ApiError::Forbidden)
                | Some(ApiError::InvalidUrl(_))
                | Some(ApiError::Keyring(_))
        ) || matches!(self, AppError::Config(_))
    }

    /// Check if this error is recoverable, i.e. retrying later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.api_root_cause(),
            Some(ApiError::RateLimited(_))
                | Some(ApiError::ServerError(_))
                | Some(ApiError::Network(_))
                | Some(ApiError::NotFound(_))
                | Some(ApiError::Conflict(_))
        )
    }

    /// Get a suggested action for the user.
    pub fn suggested_action(&self) -> Option<&'static str> {
        match self {
            AppError::Config(ConfigError::NoConfigDir)
            | AppError::Config(ConfigError::ReadError(_)) => {
                Some("Run 'insight profile add' to create a configuration file.")
            }
            AppError::Config(ConfigError::ProfileNotFound(_)) => {
                Some("Run 'insight profile list' to see the configured profiles.")
            }
            _ => match self.api_root_cause()? {
                ApiError::Unauthorized => Some(
                    "Store a new token with 'insight profile add' or set INSIGHT_API_TOKEN.",
                ),
                ApiError::RateLimited(_) => {
                    Some("Wait a few seconds or lower rate_limit_tokens in the configuration.")
                }
                ApiError::Network(_) | ApiError::ConnectionFailed(_) => {
                    Some("Check your network connection and the profile URL.")
                }
                ApiError::Unsupported(_) => {
                    Some("This operation is only available on Jira Data Center.")
                }
                _ => None,
            },
        }
    }

    /// The API error behind this error, looking through page failures.
    fn api_root_cause(&self) -> Option<&ApiError> {
        let AppError::Api(error) = self else {
            return None;
        };
        let mut error = error;
        while let ApiError::PageFetch { source, .. } = error {
            error = source;
        }
        Some(error)
    }
}

fn config_message(error: &ConfigError) -> String {
    match error {
        ConfigError::NoConfigDir => {
            "Could not find configuration directory. Please check your system settings.".to_string()
        }
        ConfigError::CreateDirError(_) => {
            "Could not create configuration directory. Check file permissions.".to_string()
        }
        ConfigError::ReadError(_) => {
            "Could not read configuration file. Please check the file exists and is readable."
                .to_string()
        }
        ConfigError::WriteError(_) => {
            "Could not save configuration. Please check file permissions.".to_string()
        }
        ConfigError::ParseError(_) => {
            "Configuration file is invalid. Please check the file format.".to_string()
        }
        ConfigError::SerializeError(_) => "Could not save configuration. Internal error.".to_string(),
        ConfigError::ValidationError(msg) => format!("Configuration error: {}", msg),
        ConfigError::ProfileNotFound(name) => format!("Profile '{}' not found.", name),
    }
}

fn api_message(error: &ApiError) -> String {
    match error {
        ApiError::Unauthorized => {
            "Authentication failed. Please check your username and API token.".to_string()
        }
        ApiError::Forbidden => {
            "Access denied. You don't have permission to access this resource.".to_string()
        }
        ApiError::NotFound(resource) => format!("'{}' was not found.", resource),
        ApiError::RateLimited(_) => {
            "Too many requests. Please wait a moment and try again.".to_string()
        }
        ApiError::ServerError(_) => "Insight server error. Please try again later.".to_string(),
        ApiError::UnexpectedStatus { status, message } => {
            format!("The request was rejected (HTTP {}): {}", status, message)
        }
        ApiError::Conflict(msg) => format!("The request conflicts with existing data: {}", msg),
        ApiError::Network(_) => {
            "Connection failed. Please check your network connection.".to_string()
        }
        ApiError::InvalidUrl(_) => "Invalid Jira URL in configuration.".to_string(),
        ApiError::Keyring(_) => {
            "Could not access secure storage. Please reconfigure your profile.".to_string()
        }
        ApiError::InvalidResponse(_) => {
            "Unexpected response from Insight. Please try again.".to_string()
        }
        ApiError::ConnectionFailed(_) => {
            "Could not connect to Insight. Please check your URL and network.".to_string()
        }
        ApiError::InvalidConfig(msg) => format!("Invalid client settings: {}", msg),
        ApiError::Unsupported(deployment) => {
            format!("This operation is not supported on {}.", deployment)
        }
        ApiError::PageFetch { page, source } => {
            format!("Failed to load page {} of the results. {}", page, api_message(source))
        }
        ApiError::Io(_) => "A file operation failed. Please check the file path.".to_string(),
    }
}

/// Result type for application operations.
pub type Result<T> = std::result::Result<T, AppError>;
