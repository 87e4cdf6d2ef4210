//! Public error types for the `crm_bridge` module.
//!
//! These errors are safe to expose to other modules and consumers.

use thiserror::Error;

/// Errors that can be returned by a [`RecordsClient`](crate::RecordsClient).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrmBridgeError {
    /// The request was rejected before reaching the store: malformed
    /// identifier or query, unmapped field, misaligned paging, bad data.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The record changed since the caller read it.
    #[error("Record {id} was modified concurrently: {message}")]
    Conflict { id: String, message: String },

    /// The record addressed by a replace does not exist.
    #[error("Resource not found: {id}")]
    NotFound { id: String },

    /// The remote store or the credential provider failed.
    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Operation '{operation}' is not implemented")]
    NotImplemented { operation: String },

    #[error("Internal error")]
    Internal,
}

impl CrmBridgeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::NotImplemented {
            operation: operation.into(),
        }
    }

    #[must_use]
    pub fn internal() -> Self {
        Self::Internal
    }
}
