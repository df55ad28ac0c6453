//! Insight connection profile configuration.

use serde::{Deserialize, Serialize};

use super::{ConfigError, Result};

/// How a profile authenticates against the Insight API.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    /// Personal access token sent as a bearer token.
    #[default]
    Token,
    /// Username and password sent as HTTP Basic credentials.
    Basic,
}

/// A connection profile for an Insight instance.
///
/// Secrets (tokens, passwords) are stored separately in the OS keychain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    /// The name of this profile.
    ///
    /// Must be non-empty and unique across all profiles.
    pub name: String,

    /// The Jira instance URL (e.g., "https://jira.example.com").
    pub url: String,

    /// The authentication scheme.
    #[serde(default)]
    pub auth: AuthKind,

    /// Username for basic authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Whether this is an Atlassian Cloud site (Assets via api.atlassian.com).
    #[serde(default)]
    pub cloud: bool,

    /// Whether TLS certificates are verified.
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
}

fn default_true() -> bool {
    true
}

impl Profile {
    /// Create a new token-authenticated profile.
    pub fn new(name: String, url: String) -> Self {
        Self {
            name,
            url,
            auth: AuthKind::Token,
            username: None,
            cloud: false,
            verify_ssl: true,
        }
    }

    /// Create a new basic-auth profile.
    pub fn with_basic_auth(name: String, url: String, username: String) -> Self {
        Self {
            auth: AuthKind::Basic,
            username: Some(username),
            ..Self::new(name, url)
        }
    }

    /// Validate this profile.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::ValidationError` with details if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "profile name cannot be empty".to_string(),
            ));
        }

        if self.name.contains(char::is_whitespace) {
            return Err(ConfigError::ValidationError(format!(
                "profile name '{}' cannot contain whitespace",
                self.name
            )));
        }

        if self.url.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "profile '{}': URL cannot be empty",
                self.name
            )));
        }

        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(ConfigError::ValidationError(format!(
                "profile '{}': URL must start with http:// or https://",
                self.name
            )));
        }

        if self.auth == AuthKind::Basic
            && self.username.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(format!(
                "profile '{}': basic authentication requires a username",
                self.name
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work_profile() -> Profile {
        Profile::new("work".to_string(), "https://jira.example.com".to_string())
    }

    #[test]
    fn test_profile_creation() {
        let profile = work_profile();

        assert_eq!(profile.name, "work");
        assert_eq!(profile.url, "https://jira.example.com");
        assert_eq!(profile.auth, AuthKind::Token);
        assert!(profile.verify_ssl);
        assert!(!profile.cloud);
    }

    #[test]
    fn test_valid_profile() {
        assert!(work_profile().validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut profile = work_profile();
        profile.name = String::new();

        let result = profile.validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("name cannot be empty"));
    }

    #[test]
    fn test_whitespace_name_rejected() {
        let mut profile = work_profile();
        profile.name = "my work".to_string();

        let result = profile.validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot contain whitespace"));
    }

    #[test]
    fn test_invalid_url_scheme_rejected() {
        let mut profile = work_profile();
        profile.url = "jira.example.com".to_string();

        let result = profile.validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must start with http"));
    }

    #[test]
    fn test_http_url_accepted() {
        let profile = Profile::new("local".to_string(), "http://localhost:8080".to_string());
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_basic_auth_requires_username() {
        let mut profile = work_profile();
        profile.auth = AuthKind::Basic;

        let result = profile.validate();
        assert!(result.unwrap_err().to_string().contains("requires a username"));

        let profile = Profile::with_basic_auth(
            "work".to_string(),
            "https://jira.example.com".to_string(),
            "admin".to_string(),
        );
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_profile_defaults_when_deserializing() {
        let profile: Profile = toml::from_str(
            r#"
            name = "dc"
            url = "https://jira.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(profile.auth, AuthKind::Token);
        assert!(profile.verify_ssl);
        assert_eq!(profile.username, None);
    }

    #[test]
    fn test_profile_serialization() {
        let profile = Profile::with_basic_auth(
            "work".to_string(),
            "https://jira.example.com".to_string(),
            "admin".to_string(),
        );

        let toml_str = toml::to_string(&profile).unwrap();
        assert!(toml_str.contains("auth = \"basic\""));
        let parsed: Profile = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, profile);
    }
}
