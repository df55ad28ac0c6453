//! Client-wide settings configuration.

use serde::{Deserialize, Serialize};

use super::{ConfigError, Result};

/// Upper bound on attempts per request.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Settings shared by every profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// The name of the default profile to use.
    pub default_profile: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Requests allowed per rate-limit interval.
    pub rate_limit_tokens: u32,
    /// Rate-limit interval in seconds.
    pub rate_limit_interval_secs: u64,
    /// Maximum number of requests in flight at once.
    pub max_concurrent_requests: usize,
    /// Maximum number of pages fetched concurrently by one query.
    pub page_concurrency: usize,
    /// Maximum attempts for a request that fails transiently.
    pub max_retries: u32,
    /// Base delay for exponential retry backoff, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Response cache time-to-live in seconds. Zero disables the cache.
    pub cache_ttl_secs: u64,
    /// Default number of results per page for IQL/AQL queries.
    pub results_per_page: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_profile: None,
            timeout_secs: 75,
            rate_limit_tokens: 10,
            rate_limit_interval_secs: 1,
            max_concurrent_requests: 20,
            page_concurrency: 5,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            cache_ttl_secs: 300,
            results_per_page: 25,
        }
    }
}

impl Settings {
    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit_tokens == 0 || self.rate_limit_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "rate limit tokens and interval must both be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_requests == 0 || self.page_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "concurrency limits must be greater than zero".to_string(),
            ));
        }
        if self.max_retries == 0 || self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "max_retries must be between 1 and {}",
                MAX_RETRIES_LIMIT
            )));
        }
        if self.results_per_page == 0 {
            return Err(ConfigError::ValidationError(
                "results_per_page must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let settings = Settings {
            rate_limit_tokens: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_page_concurrency_rejected() {
        let settings = Settings {
            page_concurrency: 0,
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_max_retries_bounds() {
        let too_many = Settings {
            max_retries: 40,
            ..Settings::default()
        };
        let err = too_many.validate().unwrap_err();
        assert!(err.to_string().contains("max_retries"));

        let at_limit = Settings {
            max_retries: MAX_RETRIES_LIMIT,
            ..Settings::default()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: Settings = toml::from_str("page_concurrency = 2").unwrap();
        assert_eq!(settings.page_concurrency, 2);
        assert_eq!(settings.timeout_secs, 75);
        assert_eq!(settings.cache_ttl_secs, 300);
    }
}
