//! Module bootstrap: configuration + mappings + capabilities → records clients.

use std::sync::Arc;

use anyhow::Context;
use crm_bridge_sdk::{CredentialProvider, DataObject, RecordsClient, StoreClient};
use tracing::info;

use crate::config::CrmBridgeConfig;
use crate::domain::connection::StoreConnector;
use crate::domain::local_client::RecordsLocalClient;
use crate::domain::manager::DomainManager;
use crate::domain::query::QueryExpressionBuilder;
use crate::domain::registry::MappingRegistry;
use crate::infra::oauth::OAuthCredentialProvider;

/// CRM bridge module.
///
/// Holds the state shared by every request: connection settings, the
/// credential provider, the store client and the mapping registry. All of it
/// is fixed once constructed.
pub struct CrmBridge {
    connector: Arc<StoreConnector>,
    registry: MappingRegistry,
    max_page_size: u32,
}

impl CrmBridge {
    /// # Errors
    ///
    /// Fails when the configuration is invalid.
    #[tracing::instrument(skip_all, fields(mode = %config.auth_mode))]
    pub fn new(
        config: &CrmBridgeConfig,
        registry: MappingRegistry,
        credentials: Arc<dyn CredentialProvider>,
        store: Arc<dyn StoreClient>,
    ) -> anyhow::Result<Self> {
        let settings = config
            .connection_settings()
            .context("invalid crm_bridge configuration")?;
        info!(
            endpoint = %settings.endpoint,
            mappings = registry.len(),
            max_page_size = config.max_page_size,
            "Initializing crm_bridge"
        );
        if registry.is_empty() {
            tracing::warn!("No entity mappings registered");
        }

        Ok(Self {
            connector: Arc::new(StoreConnector::new(settings, credentials, store)),
            registry,
            max_page_size: config.max_page_size,
        })
    }

    /// Same as [`CrmBridge::new`] with store tokens from the configured
    /// OAuth2 authority.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid or lacks client credentials.
    pub fn with_oauth(
        config: &CrmBridgeConfig,
        registry: MappingRegistry,
        store: Arc<dyn StoreClient>,
    ) -> anyhow::Result<Self> {
        let credentials = OAuthCredentialProvider::from_config(config)
            .context("failed to set up the OAuth2 credential provider")?;
        Self::new(config, registry, Arc::new(credentials), store)
    }

    /// Manager for data objects of type `D`.
    ///
    /// # Errors
    ///
    /// Fails when `D` has no registered mapping.
    pub fn manager<D: DataObject>(&self) -> anyhow::Result<Arc<DomainManager<D>>> {
        let manager = DomainManager::from_registry(
            &self.registry,
            Arc::clone(&self.connector),
            QueryExpressionBuilder::new(self.max_page_size),
        )?;
        Ok(Arc::new(manager))
    }

    /// Records client for data objects of type `D`.
    ///
    /// # Errors
    ///
    /// Fails when `D` has no registered mapping.
    pub fn client<D: DataObject>(&self) -> anyhow::Result<Arc<dyn RecordsClient<D>>> {
        let client: Arc<dyn RecordsClient<D>> = Arc::new(RecordsLocalClient::new(self.manager()?));
        Ok(client)
    }
}
