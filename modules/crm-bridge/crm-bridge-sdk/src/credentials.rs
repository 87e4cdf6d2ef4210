//! Credential provider capability.
//!
//! The bridge asks a [`CredentialProvider`] for a store access token once per
//! request scope. How the token is obtained (OAuth2 grant, static
//! configuration, managed identity) is the provider's business.

use std::fmt;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Authentication mode selector, as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthModeKind {
    /// Token acquired on behalf of the authenticated end user.
    #[default]
    Delegated,
    /// Fixed service account credentials.
    ServiceIdentity,
    /// App-only token for the registered client.
    Application,
}

impl fmt::Display for AuthModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delegated => f.write_str("delegated"),
            Self::ServiceIdentity => f.write_str("service_identity"),
            Self::Application => f.write_str("application"),
        }
    }
}

/// A resolved authentication mode with the material the provider needs.
#[derive(Debug, Clone)]
pub enum AuthMode {
    /// On-behalf-of exchange of the caller's own token.
    Delegated { user_assertion: SecretString },
    ServiceIdentity {
        username: String,
        password: SecretString,
    },
    Application,
}

impl AuthMode {
    #[must_use]
    pub fn kind(&self) -> AuthModeKind {
        match self {
            Self::Delegated { .. } => AuthModeKind::Delegated,
            Self::ServiceIdentity { .. } => AuthModeKind::ServiceIdentity,
            Self::Application => AuthModeKind::Application,
        }
    }
}

/// Access token bound to one store endpoint. `Debug` redacts the value.
#[derive(Debug, Clone)]
pub struct AccessToken {
    secret: SecretString,
}

impl AccessToken {
    pub fn new(secret: impl Into<SecretString>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Raw token text, for building the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }
}

#[derive(Error, Debug, Clone)]
pub enum CredentialError {
    /// The identity provider rejected the request (bad secret, expired
    /// assertion, missing consent).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The identity provider could not be reached or answered with a
    /// server error.
    #[error("credential service unavailable: {0}")]
    Unavailable(String),

    /// The mode is not supported by this provider.
    #[error("authentication mode '{0}' is not supported")]
    UnsupportedMode(AuthModeKind),

    #[error("internal error: {0}")]
    Internal(String),
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Resolve an access token for `endpoint` using `mode`.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] when no token can be obtained.
    async fn acquire_token(
        &self,
        endpoint: &Url,
        mode: &AuthMode,
    ) -> Result<AccessToken, CredentialError>;
}
