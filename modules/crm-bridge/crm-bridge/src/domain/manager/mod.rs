//! Generic domain manager: CRUD and query for one data-object type.
//!
//! Every operation runs inside a caller-supplied [`RequestScope`]; the store
//! session is opened on the first operation that needs it and shared by the
//! rest of the scope.
//!
//! Identifiers arrive as strings. An id that is not a UUID cannot name a
//! stored record, so `lookup`, `patch` and `delete` treat it as absent while
//! `insert` and `replace` reject it.

use std::sync::Arc;

use crm_bridge_sdk::{
    ColumnSet, DataObject, Entity, EntityMapper, QueryRequest, StoreError, StoreSession,
};
use tracing::instrument;
use uuid::Uuid;

use super::connection::{RequestScope, StoreConnector};
use super::error::DomainError;
use super::query::QueryExpressionBuilder;
use super::registry::{MappingRegistry, RegistryError};

pub struct DomainManager<D: DataObject> {
    logical_name: String,
    mapper: Arc<dyn EntityMapper<D>>,
    connector: Arc<StoreConnector>,
    query_builder: QueryExpressionBuilder,
}

impl<D: DataObject> DomainManager<D> {
    pub fn new(
        logical_name: impl Into<String>,
        mapper: Arc<dyn EntityMapper<D>>,
        connector: Arc<StoreConnector>,
        query_builder: QueryExpressionBuilder,
    ) -> Self {
        Self {
            logical_name: logical_name.into(),
            mapper,
            connector,
            query_builder,
        }
    }

    /// Manager for `D` using the mapping registered for it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRegistered`] when `D` has no mapping.
    pub fn from_registry(
        registry: &MappingRegistry,
        connector: Arc<StoreConnector>,
        query_builder: QueryExpressionBuilder,
    ) -> Result<Self, RegistryError> {
        let (logical_name, mapper) = registry.resolve::<D>()?;
        Ok(Self::new(logical_name, mapper, connector, query_builder))
    }

    #[must_use]
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    /// Create a record and return it as stored.
    ///
    /// A non-blank id on `data` becomes the new record's id.
    ///
    /// # Errors
    ///
    /// - `Validation` if `data` cannot be mapped or carries a malformed id
    /// - `Credential`/`Store` if the connection or the create fails
    #[instrument(
        skip(self, scope, data),
        fields(
            entity = %self.logical_name,
            subject = %scope.ctx().subject_id(),
        )
    )]
    pub async fn insert(&self, scope: &RequestScope, data: D) -> Result<D, DomainError> {
        tracing::info!("Creating record");

        let mut entity = self.to_entity(&data)?;
        let preset_id = match data.id().filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => Some(parse_id(raw).ok_or_else(|| malformed_id(raw))?),
            None => None,
        };
        entity.set_id(preset_id);
        entity.set_row_version(None);

        let session = self.connector.acquire(scope).await?;
        let id = session.create(entity).await?;
        let created = self.fetch(session.as_ref(), id).await?.ok_or_else(|| {
            DomainError::Store(StoreError::Internal(format!(
                "{} record {id} is missing right after create",
                self.logical_name
            )))
        })?;

        tracing::info!(%id, "Successfully created record");
        Ok(created)
    }

    /// Fetch one record; `None` when it does not exist or `id` is not a
    /// record id.
    ///
    /// # Errors
    ///
    /// - `Credential`/`Store` if the connection or the read fails
    /// - `Internal` if the stored record cannot be mapped
    #[instrument(
        skip(self, scope),
        fields(
            entity = %self.logical_name,
            subject = %scope.ctx().subject_id(),
            id = %id,
        )
    )]
    pub async fn lookup(&self, scope: &RequestScope, id: &str) -> Result<Option<D>, DomainError> {
        tracing::debug!("Looking up record");

        let Some(record_id) = parse_id(id) else {
            tracing::debug!("Not a record id, nothing to look up");
            return Ok(None);
        };
        let session = self.connector.acquire(scope).await?;
        self.fetch(session.as_ref(), record_id).await
    }

    /// Run a structured query; results keep the store's order.
    ///
    /// # Errors
    ///
    /// - `Query` if the request cannot be translated
    /// - `Credential`/`Store` if the connection or the query fails
    /// - `Internal` if a returned record cannot be mapped
    #[instrument(
        skip(self, scope, request),
        fields(
            entity = %self.logical_name,
            subject = %scope.ctx().subject_id(),
        )
    )]
    pub async fn query(
        &self,
        scope: &RequestScope,
        request: &QueryRequest,
    ) -> Result<Vec<D>, DomainError> {
        tracing::debug!("Querying records");

        let native = self
            .query_builder
            .build(&self.logical_name, request, self.mapper.as_ref())?;
        if native.yields_nothing() {
            tracing::debug!("Empty page requested, skipping the store");
            return Ok(Vec::new());
        }

        let session = self.connector.acquire(scope).await?;
        let entities = session.retrieve_multiple(&native).await?;
        let records = entities
            .iter()
            .map(|e| self.mapper.to_data(e).map_err(DomainError::mapping_out))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Successfully queried {} records", records.len());
        Ok(records)
    }

    /// Replace a record, provided it is still at the version `data` was read
    /// with.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed id, an id on `data` that names another
    ///   record, a missing concurrency token or unmappable data
    /// - `NotFound` if the record does not exist
    /// - `Conflict` if the record changed since `data` was read
    /// - `Credential`/`Store` if the connection or a store call fails
    #[instrument(
        skip(self, scope, data),
        fields(
            entity = %self.logical_name,
            subject = %scope.ctx().subject_id(),
            id = %id,
        )
    )]
    pub async fn replace(&self, scope: &RequestScope, id: &str, data: D) -> Result<D, DomainError> {
        tracing::info!("Replacing record");

        let record_id = parse_id(id).ok_or_else(|| malformed_id(id))?;
        if let Some(data_id) = data.id().filter(|raw| !raw.trim().is_empty())
            && parse_id(data_id) != Some(record_id)
        {
            return Err(DomainError::validation(
                "id",
                format!("record identity is immutable: body names '{data_id}', path names '{id}'"),
            ));
        }
        let expected = data
            .version()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| DomainError::validation("version", "concurrency token is required"))?
            .to_owned();

        let mut entity = self.to_entity(&data)?;
        entity.set_id(Some(record_id));

        let session = self.connector.acquire(scope).await?;
        let current = session
            .retrieve(&self.logical_name, record_id, &ColumnSet::Columns(Vec::new()))
            .await?
            .ok_or_else(|| DomainError::not_found(&self.logical_name, id))?;
        if current.row_version() != Some(expected.as_str()) {
            tracing::warn!(
                expected = %expected,
                actual = current.row_version().unwrap_or_default(),
                "Concurrency token mismatch, record left unchanged"
            );
            return Err(DomainError::conflict(
                &self.logical_name,
                id,
                "concurrency token does not match the stored record",
            ));
        }

        entity.set_row_version(Some(expected));
        if let Err(e) = session.update(entity).await {
            let e = DomainError::from(e);
            if matches!(e, DomainError::Conflict { .. }) {
                tracing::warn!("Record changed before the update was applied");
            }
            return Err(e);
        }

        let updated = self
            .fetch(session.as_ref(), record_id)
            .await?
            .ok_or_else(|| DomainError::not_found(&self.logical_name, id))?;

        tracing::info!("Successfully replaced record");
        Ok(updated)
    }

    /// Fetch, apply `patch` in memory and replace. `None` when the record
    /// does not exist, including when it is deleted before the write.
    ///
    /// The replace is checked against the token carried by `patch` when it
    /// has one, otherwise against the token just fetched.
    ///
    /// # Errors
    ///
    /// Same as [`DomainManager::replace`], minus `NotFound`.
    #[instrument(
        skip(self, scope, patch),
        fields(
            entity = %self.logical_name,
            subject = %scope.ctx().subject_id(),
            id = %id,
        )
    )]
    pub async fn patch(
        &self,
        scope: &RequestScope,
        id: &str,
        patch: D::Patch,
    ) -> Result<Option<D>, DomainError> {
        tracing::info!("Patching record");

        let Some(mut current) = self.lookup(scope, id).await? else {
            return Ok(None);
        };
        current.apply_patch(patch);

        match self.replace(scope, id, current).await {
            Ok(updated) => Ok(Some(updated)),
            Err(DomainError::NotFound { .. }) => {
                tracing::debug!("Record disappeared before the patch was written");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete a record; `false` when there was nothing to delete.
    ///
    /// # Errors
    ///
    /// - `Credential`/`Store` if the connection or the delete fails
    #[instrument(
        skip(self, scope),
        fields(
            entity = %self.logical_name,
            subject = %scope.ctx().subject_id(),
            id = %id,
        )
    )]
    pub async fn delete(&self, scope: &RequestScope, id: &str) -> Result<bool, DomainError> {
        tracing::info!("Deleting record");

        let Some(record_id) = parse_id(id) else {
            tracing::debug!("Not a record id, nothing to delete");
            return Ok(false);
        };
        let session = self.connector.acquire(scope).await?;
        let deleted = match session.delete(&self.logical_name, record_id).await {
            Ok(deleted) => deleted,
            Err(StoreError::RecordNotFound { .. }) => false,
            Err(e) => return Err(e.into()),
        };

        tracing::info!(deleted, "Delete finished");
        Ok(deleted)
    }

    /// # Errors
    ///
    /// Always `NotImplemented`.
    pub fn undelete(&self, id: &str) -> Result<D, DomainError> {
        tracing::debug!(entity = %self.logical_name, id, "Undelete requested");
        Err(DomainError::not_implemented("undelete"))
    }

    fn to_entity(&self, data: &D) -> Result<Entity, DomainError> {
        let entity = self.mapper.to_entity(data).map_err(DomainError::mapping_in)?;
        if entity.logical_name() != self.logical_name {
            return Err(DomainError::validation(
                "data",
                format!(
                    "mapped to entity '{}', expected '{}'",
                    entity.logical_name(),
                    self.logical_name
                ),
            ));
        }
        Ok(entity)
    }

    async fn fetch(&self, session: &dyn StoreSession, id: Uuid) -> Result<Option<D>, DomainError> {
        session
            .retrieve(&self.logical_name, id, &ColumnSet::All)
            .await?
            .map(|e| self.mapper.to_data(&e).map_err(DomainError::mapping_out))
            .transpose()
    }
}

fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

fn malformed_id(raw: &str) -> DomainError {
    DomainError::validation("id", format!("'{raw}' is not a valid record id"))
}
