//! Authentication handling for the Insight API.
//!
//! Supports HTTP Basic (username + password) and bearer tokens (personal
//! access tokens). Secrets are kept in the OS keyring, or supplied through
//! the `INSIGHT_API_TOKEN` environment variable.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::error::{ApiError, Result};
use crate::config::{AuthKind, Profile};

/// The keyring service name for stored secrets.
const KEYRING_SERVICE: &str = "insight-client";

/// Environment variable that overrides the keyring secret.
pub const TOKEN_ENV_VAR: &str = "INSIGHT_API_TOKEN";

/// Authentication credentials for the Insight API.
#[derive(Debug, Clone)]
pub struct Auth {
    /// Which scheme the header uses.
    kind: AuthKind,
    /// The complete authorization header value.
    auth_header: String,
}

impl Auth {
    /// Create HTTP Basic credentials.
    ///
    /// The password is immediately encoded and the raw value is not stored.
    pub fn basic(username: &str, password: &str) -> Self {
        Self {
            kind: AuthKind::Basic,
            auth_header: build_basic_header(username, password),
        }
    }

    /// Create bearer token credentials.
    pub fn bearer(token: &str) -> Self {
        Self {
            kind: AuthKind::Token,
            auth_header: format!("Bearer {}", token),
        }
    }

    /// Create credentials for a profile.
    ///
    /// The secret comes from `INSIGHT_API_TOKEN` when set, otherwise from the
    /// OS keyring entry stored under the profile name.
    ///
    /// # Errors
    ///
    /// Returns an error if no secret is available or the profile is
    /// missing its username for basic auth.
    pub fn from_profile(profile: &Profile) -> Result<Self> {
        let secret = match std::env::var(TOKEN_ENV_VAR) {
            Ok(token) if !token.is_empty() => token,
            _ => get_secret(&profile.name)?,
        };

        match profile.auth {
            AuthKind::Token => Ok(Self::bearer(&secret)),
            AuthKind::Basic => {
                let username = profile.username.as_deref().ok_or_else(|| {
                    ApiError::InvalidConfig(format!(
                        "profile '{}' uses basic auth but has no username",
                        profile.name
                    ))
                })?;
                Ok(Self::basic(username, &secret))
            }
        }
    }

    /// Get the authorization header value for HTTP requests.
    pub fn header_value(&self) -> &str {
        &self.auth_header
    }

    /// Get the authentication scheme.
    pub fn kind(&self) -> AuthKind {
        self.kind
    }
}

/// Build the Basic Auth header value.
///
/// Encodes "username:password" in Base64 and prepends "Basic ".
fn build_basic_header(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    let encoded = BASE64.encode(credentials.as_bytes());
    format!("Basic {}", encoded)
}

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry> {
    keyring::Entry::new(KEYRING_SERVICE, profile_name)
        .map_err(|e| ApiError::Keyring(format!("failed to access keyring: {}", e)))
}

/// Store a token or password in the OS keyring.
pub fn store_secret(profile_name: &str, secret: &str) -> Result<()> {
    keyring_entry(profile_name)?
        .set_password(secret)
        .map_err(|e| ApiError::Keyring(format!("failed to store secret: {}", e)))
}

/// Retrieve a token or password from the OS keyring.
pub fn get_secret(profile_name: &str) -> Result<String> {
    keyring_entry(profile_name)?
        .get_password()
        .map_err(|e| ApiError::Keyring(format!("failed to retrieve secret: {}", e)))
}

/// Delete a stored secret from the OS keyring.
pub fn delete_secret(profile_name: &str) -> Result<()> {
    keyring_entry(profile_name)?
        .delete_password()
        .map_err(|e| ApiError::Keyring(format!("failed to delete secret: {}", e)))
}

/// Check if a secret exists in the OS keyring for a profile.
pub fn has_secret(profile_name: &str) -> bool {
    get_secret(profile_name).is_ok()
}
