//! Entity mapping capability.
//!
//! One [`EntityMapper`] exists per data-object/entity pair. The host supplies
//! it at bootstrap; the bridge never inspects data-object fields itself.

use thiserror::Error;

use crate::models::{DataObject, Entity, Value};

/// Errors raised while converting between data objects and entities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("required field '{field}' is missing")]
    MissingField { field: String },

    #[error("field '{field}' has an invalid value: {message}")]
    InvalidValue { field: String, message: String },

    #[error("expected entity '{expected}', got '{actual}'")]
    WrongEntity { expected: String, actual: String },
}

impl MappingError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Reverse field map from data-object field names to backend attributes.
///
/// This is the only part of a mapper the query translation needs.
pub trait FieldResolver: Send + Sync {
    /// Backend attribute for a data-object field, `None` when unmapped.
    fn resolve_backend_field(&self, field: &str) -> Option<&str>;

    /// Convert a filter literal to the backend representation of
    /// `backend_field`. The default passes the value through.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::InvalidValue`] when the literal cannot be
    /// represented by the backend attribute.
    fn to_backend_value(&self, backend_field: &str, value: Value) -> Result<Value, MappingError> {
        let _ = backend_field;
        Ok(value)
    }
}

/// Bidirectional conversion between a data object and its backend entity.
pub trait EntityMapper<D: DataObject>: FieldResolver {
    /// Build the entity to write. The returned entity must carry the logical
    /// name the type is registered under.
    ///
    /// # Errors
    ///
    /// Returns a [`MappingError`] when the data object cannot be represented.
    fn to_entity(&self, data: &D) -> Result<Entity, MappingError>;

    /// Build the data object for a stored entity, including its identifier
    /// and concurrency token.
    ///
    /// # Errors
    ///
    /// Returns a [`MappingError`] when required attributes are missing or
    /// malformed.
    fn to_data(&self, entity: &Entity) -> Result<D, MappingError>;
}
