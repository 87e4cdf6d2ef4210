//! Local (in-process) records client.

use std::sync::Arc;

use async_trait::async_trait;
use crm_bridge_sdk::{CrmBridgeError, DataObject, QueryRequest, RecordsClient};
use crm_security::SecurityContext;

use super::connection::RequestScope;
use super::error::DomainError;
use super::manager::DomainManager;

/// [`RecordsClient`] backed by a [`DomainManager`]. Each call runs in its own
/// [`RequestScope`].
pub struct RecordsLocalClient<D: DataObject> {
    manager: Arc<DomainManager<D>>,
}

impl<D: DataObject> RecordsLocalClient<D> {
    #[must_use]
    pub fn new(manager: Arc<DomainManager<D>>) -> Self {
        Self { manager }
    }

    #[must_use]
    pub fn manager(&self) -> &DomainManager<D> {
        &self.manager
    }
}

fn log_and_convert(op: &str, e: DomainError) -> CrmBridgeError {
    match &e {
        DomainError::Credential(_) | DomainError::Store(_) | DomainError::Internal { .. } => {
            tracing::error!(operation = op, error = %e, "crm_bridge call failed");
        }
        _ => tracing::debug!(operation = op, error = %e, "crm_bridge call rejected"),
    }
    e.into()
}

#[async_trait]
impl<D: DataObject> RecordsClient<D> for RecordsLocalClient<D> {
    async fn insert(&self, ctx: &SecurityContext, data: D) -> Result<D, CrmBridgeError> {
        let scope = RequestScope::new(ctx.clone());
        self.manager
            .insert(&scope, data)
            .await
            .map_err(|e| log_and_convert("insert", e))
    }

    async fn lookup(&self, ctx: &SecurityContext, id: &str) -> Result<Option<D>, CrmBridgeError> {
        let scope = RequestScope::new(ctx.clone());
        self.manager
            .lookup(&scope, id)
            .await
            .map_err(|e| log_and_convert("lookup", e))
    }

    async fn query(
        &self,
        ctx: &SecurityContext,
        query: &QueryRequest,
    ) -> Result<Vec<D>, CrmBridgeError> {
        let scope = RequestScope::new(ctx.clone());
        self.manager
            .query(&scope, query)
            .await
            .map_err(|e| log_and_convert("query", e))
    }

    async fn replace(&self, ctx: &SecurityContext, id: &str, data: D) -> Result<D, CrmBridgeError> {
        let scope = RequestScope::new(ctx.clone());
        self.manager
            .replace(&scope, id, data)
            .await
            .map_err(|e| log_and_convert("replace", e))
    }

    async fn patch(
        &self,
        ctx: &SecurityContext,
        id: &str,
        patch: D::Patch,
    ) -> Result<Option<D>, CrmBridgeError> {
        let scope = RequestScope::new(ctx.clone());
        self.manager
            .patch(&scope, id, patch)
            .await
            .map_err(|e| log_and_convert("patch", e))
    }

    async fn delete(&self, ctx: &SecurityContext, id: &str) -> Result<bool, CrmBridgeError> {
        let scope = RequestScope::new(ctx.clone());
        self.manager
            .delete(&scope, id)
            .await
            .map_err(|e| log_and_convert("delete", e))
    }

    async fn undelete(&self, _ctx: &SecurityContext, id: &str) -> Result<D, CrmBridgeError> {
        self.manager
            .undelete(id)
            .map_err(|e| log_and_convert("undelete", e))
    }
}
