//! Public API trait for the CRM bridge.
//!
//! One client exists per data-object type. The hosting layer (REST/OData
//! routes, other modules) calls it with the authenticated caller's
//! [`SecurityContext`]; every call is an independent request scope.

use async_trait::async_trait;
use crm_security::SecurityContext;

use crate::error::CrmBridgeError;
use crate::models::DataObject;
use crate::query::QueryRequest;

/// Inbound CRUD + query surface for data objects of type `D`.
///
/// # Not found
///
/// `lookup`, `patch` and `delete` report a missing record (including an
/// identifier that is not a valid record id) as `None`/`false`, not as an
/// error.
#[async_trait]
pub trait RecordsClient<D: DataObject>: Send + Sync {
    /// Create a record and return it as stored.
    ///
    /// # Errors
    ///
    /// - `Validation` if the data object cannot be mapped
    /// - `Store` if the store or credential provider fails
    async fn insert(&self, ctx: &SecurityContext, data: D) -> Result<D, CrmBridgeError>;

    /// Fetch one record by identifier.
    ///
    /// # Errors
    ///
    /// - `Store` if the store or credential provider fails
    async fn lookup(&self, ctx: &SecurityContext, id: &str) -> Result<Option<D>, CrmBridgeError>;

    /// Run a structured query; results keep the store's order.
    ///
    /// # Errors
    ///
    /// - `Validation` for malformed queries, unmapped fields or misaligned paging
    /// - `Store` if the store or credential provider fails
    async fn query(
        &self,
        ctx: &SecurityContext,
        query: &QueryRequest,
    ) -> Result<Vec<D>, CrmBridgeError>;

    /// Replace a record. `data` must carry the concurrency token it was read
    /// with.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed id, a changed identity or a missing token
    /// - `Conflict` if the stored token differs
    /// - `NotFound` if the record does not exist
    /// - `Store` if the store or credential provider fails
    async fn replace(&self, ctx: &SecurityContext, id: &str, data: D) -> Result<D, CrmBridgeError>;

    /// Apply a partial update by fetching, modifying and replacing the record.
    ///
    /// # Errors
    ///
    /// Same as [`RecordsClient::replace`], except that a missing record is
    /// `Ok(None)`.
    async fn patch(
        &self,
        ctx: &SecurityContext,
        id: &str,
        patch: D::Patch,
    ) -> Result<Option<D>, CrmBridgeError>;

    /// Delete a record; `false` when there was nothing to delete.
    ///
    /// # Errors
    ///
    /// - `Store` if the store or credential provider fails
    async fn delete(&self, ctx: &SecurityContext, id: &str) -> Result<bool, CrmBridgeError>;

    /// Restore a deleted record.
    ///
    /// # Errors
    ///
    /// Always `NotImplemented`: the store keeps no recoverable deletes.
    async fn undelete(&self, ctx: &SecurityContext, id: &str) -> Result<D, CrmBridgeError>;
}
