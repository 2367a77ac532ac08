//! # Caller authentication
//!
//! Every call to the tool endpoint carries an `Authorization` header with
//! HTTP Basic credentials: a site username and one of that user's
//! application passwords. The [`Authenticator`] turns the header into a
//! [`Principal`] or an [`AuthError`]:
//!
//! 1. Parse the header into [`Credentials`] (scheme, base64, `user:pass`)
//! 2. Refuse when the site cannot verify application passwords
//! 3. Ask the [`IdentityStore`] to verify the pair
//! 4. Require the baseline permission (`read` unless configured otherwise)
//!
//! Steps 1 and 2 never touch the identity collaborator.

pub mod principal;

pub use principal::Principal;

use std::sync::Arc;

use base64::Engine;
use tracing::{debug, warn};

use crate::platform::{IdentityStore, Platform, PlatformError};

/// Why a caller was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header missing")]
    NoCredentials,

    #[error("Invalid credentials")]
    MalformedCredentials,

    #[error("Unsupported authorization scheme")]
    UnsupportedScheme,

    #[error("Application passwords not available")]
    BackendUnavailable,

    #[error("Authentication failed")]
    Rejected,

    #[error("Insufficient permissions")]
    InsufficientPermission,
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Username and password decoded from a Basic header. Both halves are
/// non-empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Parse an `Authorization` header value.
    pub fn from_header(header: Option<&str>) -> Result<Self, AuthError> {
        let header = header.map(str::trim).unwrap_or_default();
        if header.is_empty() {
            return Err(AuthError::NoCredentials);
        }

        let (scheme, token) = match header.split_once(char::is_whitespace) {
            Some((scheme, token)) => (scheme, token.trim()),
            None => (header, ""),
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(AuthError::UnsupportedScheme);
        }

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(token)
            .map_err(|_| AuthError::MalformedCredentials)?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthError::MalformedCredentials)?;

        let (username, password) = decoded
            .split_once(':')
            .ok_or(AuthError::MalformedCredentials)?;
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MalformedCredentials);
        }

        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Render as a Basic header value.
    pub fn to_header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw.as_bytes())
        )
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Authenticator
// ---------------------------------------------------------------------------

pub struct Authenticator {
    identity: Arc<dyn IdentityStore>,
    application_passwords: bool,
    baseline_permission: String,
}

impl Authenticator {
    pub fn new(platform: &Platform, baseline_permission: impl Into<String>) -> Self {
        Self {
            identity: platform.identity.clone(),
            application_passwords: platform.application_passwords,
            baseline_permission: baseline_permission.into(),
        }
    }

    pub fn baseline_permission(&self) -> &str {
        &self.baseline_permission
    }

    pub async fn authenticate(&self, header: Option<&str>) -> Result<Principal, AuthError> {
        let credentials = Credentials::from_header(header).inspect_err(|e| {
            warn!(error = %e, "Rejected credentials before verification");
        })?;

        if !self.application_passwords {
            warn!("Application passwords unavailable; refusing caller");
            return Err(AuthError::BackendUnavailable);
        }

        let principal = self
            .identity
            .verify_application_password(&credentials.username, &credentials.password)
            .await
            .map_err(|e| match e {
                PlatformError::Unavailable(reason) => {
                    warn!(%reason, "Identity backend unavailable");
                    AuthError::BackendUnavailable
                }
                other => {
                    warn!(username = %credentials.username, error = %other, "Credentials refused");
                    AuthError::Rejected
                }
            })?;

        if !principal.has_permission(&self.baseline_permission) {
            warn!(
                username = %principal.username,
                permission = %self.baseline_permission,
                "Caller lacks baseline permission"
            );
            return Err(AuthError::InsufficientPermission);
        }

        debug!(user_id = principal.user_id, username = %principal.username, "Caller authenticated");
        Ok(principal)
    }
}
