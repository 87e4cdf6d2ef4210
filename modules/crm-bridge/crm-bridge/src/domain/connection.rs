//! Request-scoped store connection.
//!
//! A [`RequestScope`] is created when an inbound call enters the module and
//! dropped when it leaves. The first [`StoreConnector::acquire`] within the
//! scope resolves a token for the configured authentication mode and opens a
//! session; later calls reuse that session. Concurrent first calls share one
//! acquisition. A failed acquisition is not remembered, so the next call
//! starts over.

use std::sync::Arc;

use crm_bridge_sdk::{
    AuthMode, AuthModeKind, CredentialError, CredentialProvider, StoreClient, StoreSession,
};
use crm_security::SecurityContext;
use secrecy::SecretString;
use tokio::sync::OnceCell;
use tracing::instrument;
use url::Url;

use super::error::DomainError;

/// Per-request connection settings derived from configuration.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub endpoint: Url,
    pub auth_mode: AuthModeKind,
    pub service_identity: Option<ServiceCredentials>,
}

#[derive(Debug, Clone)]
pub struct ServiceCredentials {
    pub username: String,
    pub password: SecretString,
}

/// State of one inbound request: the caller and its (lazily opened) store
/// session.
pub struct RequestScope {
    ctx: SecurityContext,
    session: OnceCell<Arc<dyn StoreSession>>,
}

impl RequestScope {
    #[must_use]
    pub fn new(ctx: SecurityContext) -> Self {
        Self {
            ctx,
            session: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn ctx(&self) -> &SecurityContext {
        &self.ctx
    }

    /// `true` once a session has been opened in this scope.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.initialized()
    }
}

/// Opens authenticated store sessions for request scopes.
pub struct StoreConnector {
    settings: ConnectionSettings,
    credentials: Arc<dyn CredentialProvider>,
    store: Arc<dyn StoreClient>,
}

impl StoreConnector {
    #[must_use]
    pub fn new(
        settings: ConnectionSettings,
        credentials: Arc<dyn CredentialProvider>,
        store: Arc<dyn StoreClient>,
    ) -> Self {
        Self {
            settings,
            credentials,
            store,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Session for `scope`, opened on first use.
    ///
    /// # Errors
    ///
    /// - `Credential` if no token could be obtained (including a delegated
    ///   call without a caller token)
    /// - `Store` if the store refuses the connection
    pub async fn acquire(
        &self,
        scope: &RequestScope,
    ) -> Result<Arc<dyn StoreSession>, DomainError> {
        scope
            .session
            .get_or_try_init(|| self.connect(&scope.ctx))
            .await
            .cloned()
    }

    #[instrument(
        skip_all,
        fields(endpoint = %self.settings.endpoint, mode = %self.settings.auth_mode)
    )]
    async fn connect(&self, ctx: &SecurityContext) -> Result<Arc<dyn StoreSession>, DomainError> {
        let mode = self.auth_mode(ctx)?;
        let token = self
            .credentials
            .acquire_token(&self.settings.endpoint, &mode)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "token acquisition failed"))?;
        let session = self.store.connect(&self.settings.endpoint, token).await?;
        tracing::debug!("store session established");
        Ok(session)
    }

    fn auth_mode(&self, ctx: &SecurityContext) -> Result<AuthMode, DomainError> {
        match self.settings.auth_mode {
            AuthModeKind::Delegated => {
                let assertion = ctx.bearer_token().ok_or_else(|| {
                    CredentialError::Unauthorized(
                        "delegated access requires the caller's bearer token".to_owned(),
                    )
                })?;
                Ok(AuthMode::Delegated {
                    user_assertion: assertion.clone(),
                })
            }
            AuthModeKind::ServiceIdentity => {
                let creds = self.settings.service_identity.as_ref().ok_or_else(|| {
                    CredentialError::Internal(
                        "service identity credentials are not configured".to_owned(),
                    )
                })?;
                Ok(AuthMode::ServiceIdentity {
                    username: creds.username.clone(),
                    password: creds.password.clone(),
                })
            }
            AuthModeKind::Application => Ok(AuthMode::Application),
        }
    }
}
