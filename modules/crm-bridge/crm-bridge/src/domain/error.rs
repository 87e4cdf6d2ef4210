use crm_bridge_sdk::{CredentialError, CrmBridgeError, MappingError, StoreError};
use thiserror::Error;

use super::query::QueryError;

/// Domain-specific errors using thiserror
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Query translation failed: {0}")]
    Query(#[from] QueryError),

    #[error("{entity} record {id} was modified concurrently: {message}")]
    Conflict {
        entity: String,
        id: String,
        message: String,
    },

    #[error("{entity} record not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Credential acquisition failed: {0}")]
    Credential(#[from] CredentialError),

    #[error("Store call failed: {0}")]
    Store(StoreError),

    #[error("Operation '{operation}' is not implemented")]
    NotImplemented { operation: &'static str },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn conflict(
        entity: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            entity: entity.into(),
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn not_implemented(operation: &'static str) -> Self {
        Self::NotImplemented { operation }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// A data object that could not be turned into an entity is the caller's
    /// fault.
    #[must_use]
    #[allow(clippy::needless_pass_by_value)]
    pub fn mapping_in(e: MappingError) -> Self {
        Self::validation("data", e.to_string())
    }

    /// A stored entity that cannot be turned into a data object is ours.
    #[must_use]
    #[allow(clippy::needless_pass_by_value)]
    pub fn mapping_out(e: MappingError) -> Self {
        Self::internal(format!("stored record could not be mapped: {e}"))
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::RecordNotFound { logical_name, id } => {
                Self::not_found(logical_name, id.to_string())
            }
            StoreError::VersionMismatch { logical_name, id } => Self::conflict(
                logical_name,
                id.to_string(),
                "row version changed before the update was applied",
            ),
            other => Self::Store(other),
        }
    }
}

/// Convert domain errors to SDK errors for public API consumption.
impl From<DomainError> for CrmBridgeError {
    fn from(domain_error: DomainError) -> Self {
        match domain_error {
            DomainError::Validation { field, message } => {
                CrmBridgeError::validation(format!("{field}: {message}"))
            }
            DomainError::Query(e) => CrmBridgeError::validation(e.to_string()),
            DomainError::Conflict { id, message, .. } => CrmBridgeError::conflict(id, message),
            DomainError::NotFound { id, .. } => CrmBridgeError::not_found(id),
            DomainError::Credential(e) => {
                CrmBridgeError::store(format!("credential acquisition failed: {e}"))
            }
            DomainError::Store(e) => CrmBridgeError::store(e.to_string()),
            DomainError::NotImplemented { operation } => CrmBridgeError::not_implemented(operation),
            DomainError::Internal { .. } => CrmBridgeError::internal(),
        }
    }
}
