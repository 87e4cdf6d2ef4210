//! Configuration for the CRM bridge module.

use std::path::Path;

use crm_bridge_sdk::AuthModeKind;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::domain::connection::{ConnectionSettings, ServiceCredentials};

/// Prefix of environment variables overriding file configuration, e.g.
/// `CRM_BRIDGE__MAX_PAGE_SIZE=500` or `CRM_BRIDGE__SERVICE_IDENTITY__USERNAME=svc`.
pub const ENV_PREFIX: &str = "CRM_BRIDGE__";

pub const DEFAULT_MAX_PAGE_SIZE: u32 = 5000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),

    #[error("invalid configuration: {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Module configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrmBridgeConfig {
    /// Base URL of the record store (also the OAuth2 resource).
    pub endpoint: String,

    /// Identity provider authority, e.g.
    /// `https://login.microsoftonline.com/<tenant>`.
    pub authority: String,

    /// Registered client (application) id.
    pub client_id: String,

    pub client_secret: Option<SecretString>,

    /// How store tokens are obtained.
    pub auth_mode: AuthModeKind,

    /// Required when `auth_mode` is `service_identity`.
    pub service_identity: Option<ServiceIdentityConfig>,

    /// Largest `top` a query may request.
    pub max_page_size: u32,

    /// Timeout for token endpoint calls, in seconds.
    pub token_timeout_secs: u64,
}

impl Default for CrmBridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            authority: "https://login.microsoftonline.com/common".to_owned(),
            client_id: String::new(),
            client_secret: None,
            auth_mode: AuthModeKind::default(),
            service_identity: None,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            token_timeout_secs: 30,
        }
    }
}

/// Fixed service account used by the `service_identity` mode.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceIdentityConfig {
    pub username: String,
    pub password: SecretString,
}

impl CrmBridgeConfig {
    /// Load configuration from a YAML file, overridden by `CRM_BRIDGE__*`
    /// environment variables. A missing file yields the defaults plus the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when the file or an override cannot be
    /// parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::figment(path.as_ref())
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Parsed store endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the endpoint is empty or not an
    /// absolute http(s) URL.
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        parse_http_url("endpoint", &self.endpoint)
    }

    /// Parsed identity provider authority.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the authority is not an absolute
    /// http(s) URL.
    pub fn authority_url(&self) -> Result<Url, ConfigError> {
        parse_http_url("authority", &self.authority)
    }

    /// Check the configuration and derive the per-request connection
    /// settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn connection_settings(&self) -> Result<ConnectionSettings, ConfigError> {
        let endpoint = self.endpoint_url()?;
        self.authority_url()?;

        if self.max_page_size == 0 {
            return Err(ConfigError::invalid(
                "max_page_size",
                "must be greater than zero",
            ));
        }

        let service_identity = match (self.auth_mode, &self.service_identity) {
            (AuthModeKind::ServiceIdentity, None) => {
                return Err(ConfigError::invalid(
                    "service_identity",
                    "required when auth_mode is service_identity",
                ));
            }
            (AuthModeKind::ServiceIdentity, Some(si)) if si.username.trim().is_empty() => {
                return Err(ConfigError::invalid(
                    "service_identity.username",
                    "must not be empty",
                ));
            }
            (_, si) => si.as_ref().map(|si| ServiceCredentials {
                username: si.username.clone(),
                password: si.password.clone(),
            }),
        };

        Ok(ConnectionSettings {
            endpoint,
            auth_mode: self.auth_mode,
            service_identity,
        })
    }
}

fn parse_http_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    if raw.trim().is_empty() {
        return Err(ConfigError::invalid(field, "must not be empty"));
    }
    let url = Url::parse(raw).map_err(|e| ConfigError::invalid(field, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::invalid(
            field,
            format!("unsupported scheme '{other}'"),
        )),
    }
}
