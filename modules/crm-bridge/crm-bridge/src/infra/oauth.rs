//! OAuth2 credential provider.
//!
//! Requests store tokens from `{authority}/oauth2/v2.0/token` with the scope
//! `{endpoint}/.default`:
//!
//! | Mode | Grant |
//! |------|-------|
//! | `application` | `client_credentials` |
//! | `service_identity` | `password` |
//! | `delegated` | `urn:ietf:params:oauth:grant-type:jwt-bearer`, `requested_token_use=on_behalf_of` |
//!
//! Application and service-identity tokens are cached per endpoint until
//! shortly before they expire. Delegated tokens belong to one caller and are
//! never cached.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use crm_bridge_sdk::{AccessToken, AuthMode, AuthModeKind, CredentialError, CredentialProvider};
use parking_lot::Mutex;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::config::{ConfigError, CrmBridgeConfig};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens are refreshed this long before the provider says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

struct CachedToken {
    secret: SecretString,
    expires_at: Instant,
}

pub struct OAuthCredentialProvider {
    client: Client,
    token_url: Url,
    client_id: String,
    client_secret: Option<SecretString>,
    cache: Mutex<HashMap<(AuthModeKind, String), CachedToken>>,
}

impl OAuthCredentialProvider {
    /// # Errors
    ///
    /// Returns [`CredentialError::Internal`] if the token URL cannot be built
    /// or the HTTP client cannot be created.
    pub fn new(
        authority: &Url,
        client_id: impl Into<String>,
        client_secret: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, CredentialError> {
        let token_url = Url::parse(&format!(
            "{}/oauth2/v2.0/token",
            authority.as_str().trim_end_matches('/')
        ))
        .map_err(|e| CredentialError::Internal(format!("invalid authority: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CredentialError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token_url,
            client_id: client_id.into(),
            client_secret,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the authority is malformed, no
    /// client id is configured, or the mode needs a client secret that is
    /// missing.
    pub fn from_config(config: &CrmBridgeConfig) -> Result<Self, ConfigError> {
        let authority = config.authority_url()?;
        if config.client_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "client_id",
                message: "required by the OAuth2 credential provider".to_owned(),
            });
        }
        if config.client_secret.is_none() && config.auth_mode != AuthModeKind::ServiceIdentity {
            return Err(ConfigError::Invalid {
                field: "client_secret",
                message: format!("required for auth_mode {}", config.auth_mode),
            });
        }
        Self::new(
            &authority,
            config.client_id.clone(),
            config.client_secret.clone(),
            Duration::from_secs(config.token_timeout_secs),
        )
        .map_err(|e| ConfigError::Invalid {
            field: "authority",
            message: e.to_string(),
        })
    }

    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    fn cached(&self, key: &(AuthModeKind, String)) -> Option<AccessToken> {
        let cache = self.cache.lock();
        cache
            .get(key)
            .filter(|t| Instant::now() < t.expires_at)
            .map(|t| AccessToken::new(t.secret.clone()))
    }

    fn client_secret(&self, kind: AuthModeKind) -> Result<&str, CredentialError> {
        self.client_secret
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .ok_or_else(|| {
                CredentialError::Internal(format!("client secret required for {kind} tokens"))
            })
    }

    fn form(
        &self,
        scope: &str,
        mode: &AuthMode,
    ) -> Result<Vec<(&'static str, String)>, CredentialError> {
        let mut form = vec![
            ("client_id", self.client_id.clone()),
            ("scope", scope.to_owned()),
        ];
        match mode {
            AuthMode::Application => {
                form.push(("grant_type", "client_credentials".to_owned()));
                form.push(("client_secret", self.client_secret(mode.kind())?.to_owned()));
            }
            AuthMode::ServiceIdentity { username, password } => {
                form.push(("grant_type", "password".to_owned()));
                form.push(("username", username.clone()));
                form.push(("password", password.expose_secret().to_owned()));
                if let Some(secret) = &self.client_secret {
                    form.push(("client_secret", secret.expose_secret().to_owned()));
                }
            }
            AuthMode::Delegated { user_assertion } => {
                form.push(("grant_type", JWT_BEARER_GRANT.to_owned()));
                form.push(("client_secret", self.client_secret(mode.kind())?.to_owned()));
                form.push(("assertion", user_assertion.expose_secret().to_owned()));
                form.push(("requested_token_use", "on_behalf_of".to_owned()));
            }
        }
        Ok(form)
    }

    async fn request(
        &self,
        form: &[(&'static str, String)],
    ) -> Result<TokenResponse, CredentialError> {
        let response = self
            .client
            .post(self.token_url.clone())
            .form(form)
            .send()
            .await
            .map_err(|e| CredentialError::Unavailable(format!("token request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return response.json::<TokenResponse>().await.map_err(|e| {
                CredentialError::Internal(format!("failed to parse token response: {e}"))
            });
        }

        let body = response.text().await.unwrap_or_else(|e| {
            tracing::debug!(%status, error = %e, "failed to read token error response body");
            String::new()
        });
        if status.is_server_error() {
            return Err(CredentialError::Unavailable(format!(
                "token endpoint returned {status}"
            )));
        }
        let reason = serde_json::from_str::<TokenErrorResponse>(&body).map_or_else(
            |_| format!("token endpoint returned {status}"),
            |e| match e.error_description {
                Some(description) => format!("{}: {description}", e.error),
                None => e.error,
            },
        );
        Err(CredentialError::Unauthorized(reason))
    }
}

#[async_trait]
impl CredentialProvider for OAuthCredentialProvider {
    async fn acquire_token(
        &self,
        endpoint: &Url,
        mode: &AuthMode,
    ) -> Result<AccessToken, CredentialError> {
        let kind = mode.kind();
        let resource = endpoint.as_str().trim_end_matches('/');
        let cache_key = (kind, resource.to_owned());
        let cacheable = kind != AuthModeKind::Delegated;

        if cacheable && let Some(token) = self.cached(&cache_key) {
            tracing::debug!(%kind, "using cached store token");
            return Ok(token);
        }

        let form = self.form(&format!("{resource}/.default"), mode)?;
        tracing::debug!(%kind, token_url = %self.token_url, "requesting store token");
        let response = self.request(&form).await?;

        let secret = SecretString::from(response.access_token);
        if cacheable {
            let lifetime = Duration::from_secs(response.expires_in.unwrap_or(0));
            let expires_at = Instant::now()
                .checked_add(lifetime.saturating_sub(EXPIRY_MARGIN))
                .unwrap_or_else(Instant::now);
            self.cache.lock().insert(
                cache_key,
                CachedToken {
                    secret: secret.clone(),
                    expires_at,
                },
            );
        }
        Ok(AccessToken::new(secret))
    }
}
