//! Remote store client capability.
//!
//! [`StoreClient::connect`] turns an endpoint and access token into a
//! [`StoreSession`], the token-bound connection handle the bridge keeps for
//! the duration of one request.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::credentials::AccessToken;
use crate::models::Entity;
use crate::native::{ColumnSet, NativeQuery};

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The store refused the token.
    #[error("store rejected credentials: {0}")]
    Unauthorized(String),

    #[error("{logical_name} record {id} does not exist")]
    RecordNotFound { logical_name: String, id: Uuid },

    /// A conditional update found a different row version.
    #[error("{logical_name} record {id} was modified concurrently")]
    VersionMismatch { logical_name: String, id: Uuid },

    /// The store refused the request (constraint or schema violation).
    #[error("store rejected request: {0}")]
    Rejected(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store internal error: {0}")]
    Internal(String),
}

#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Open a session authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the endpoint is unreachable or rejects
    /// the token.
    async fn connect(
        &self,
        endpoint: &Url,
        token: AccessToken,
    ) -> Result<Arc<dyn StoreSession>, StoreError>;
}

/// Token-bound connection to the store.
///
/// # Errors
///
/// Every method returns a [`StoreError`] when the remote call fails.
#[async_trait]
pub trait StoreSession: Send + Sync {
    /// Create a record and return its identifier. A preset `entity.id()` is
    /// used as the new record's identifier.
    async fn create(&self, entity: Entity) -> Result<Uuid, StoreError>;

    /// Read one record, `None` when it does not exist.
    async fn retrieve(
        &self,
        logical_name: &str,
        id: Uuid,
        columns: &ColumnSet,
    ) -> Result<Option<Entity>, StoreError>;

    async fn retrieve_multiple(&self, query: &NativeQuery) -> Result<Vec<Entity>, StoreError>;

    /// Write the attributes present on `entity` to the record `entity.id()`.
    ///
    /// When `entity.row_version()` is set the update only applies if the
    /// stored row version still matches, otherwise
    /// [`StoreError::VersionMismatch`] is returned.
    async fn update(&self, entity: Entity) -> Result<(), StoreError>;

    /// Delete a record; `false` when nothing was deleted.
    async fn delete(&self, logical_name: &str, id: Uuid) -> Result<bool, StoreError>;
}
