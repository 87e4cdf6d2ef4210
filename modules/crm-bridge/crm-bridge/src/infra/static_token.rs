//! Static credential provider.
//!
//! Hands out pre-configured tokens per authentication mode. Meant for
//! development and tests; in delegated mode without a configured token the
//! caller's own assertion is passed through unchanged.

use std::collections::HashMap;

use async_trait::async_trait;
use crm_bridge_sdk::{AccessToken, AuthMode, AuthModeKind, CredentialError, CredentialProvider};
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Plugin configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticTokenConfig {
    pub delegated: Option<SecretString>,
    pub service_identity: Option<SecretString>,
    pub application: Option<SecretString>,
    /// Pass the caller's assertion through as the store token in delegated
    /// mode when no delegated token is configured.
    pub pass_through_assertion: bool,
}

pub struct StaticCredentialProvider {
    tokens: HashMap<AuthModeKind, SecretString>,
    pass_through_assertion: bool,
}

impl StaticCredentialProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
            pass_through_assertion: false,
        }
    }

    #[must_use]
    pub fn from_config(config: &StaticTokenConfig) -> Self {
        let mut provider = Self::new();
        provider.pass_through_assertion = config.pass_through_assertion;
        for (kind, token) in [
            (AuthModeKind::Delegated, &config.delegated),
            (AuthModeKind::ServiceIdentity, &config.service_identity),
            (AuthModeKind::Application, &config.application),
        ] {
            if let Some(token) = token {
                provider.tokens.insert(kind, token.clone());
            }
        }
        provider
    }

    #[must_use]
    pub fn with_token(mut self, kind: AuthModeKind, token: impl Into<SecretString>) -> Self {
        self.tokens.insert(kind, token.into());
        self
    }

    #[must_use]
    pub fn with_pass_through_assertion(mut self) -> Self {
        self.pass_through_assertion = true;
        self
    }
}

impl Default for StaticCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn acquire_token(
        &self,
        endpoint: &Url,
        mode: &AuthMode,
    ) -> Result<AccessToken, CredentialError> {
        let kind = mode.kind();
        if let Some(token) = self.tokens.get(&kind) {
            tracing::debug!(%endpoint, %kind, "issuing static token");
            return Ok(AccessToken::new(token.clone()));
        }
        match mode {
            AuthMode::Delegated { user_assertion } if self.pass_through_assertion => {
                Ok(AccessToken::new(user_assertion.clone()))
            }
            _ => Err(CredentialError::UnsupportedMode(kind)),
        }
    }
}
