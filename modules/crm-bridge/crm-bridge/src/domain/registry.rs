//! Mapping registry: data-object type → (logical entity name, mapper).
//!
//! Built once at bootstrap and read-only afterwards. Registration validates
//! eagerly so that a misconfigured type fails startup instead of a request.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crm_bridge_sdk::{DataObject, EntityMapper};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid logical entity name '{name}' for {type_name}")]
    InvalidLogicalName {
        name: String,
        type_name: &'static str,
    },

    #[error("{type_name} is already registered (as '{logical_name}')")]
    DuplicateRegistration {
        type_name: &'static str,
        logical_name: String,
    },

    #[error("no entity mapping registered for {type_name}")]
    NotRegistered { type_name: &'static str },
}

struct Registration {
    logical_name: String,
    /// `Arc<dyn EntityMapper<D>>` for the key's `D`.
    mapper: Box<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub struct MappingRegistry {
    entries: HashMap<TypeId, Registration>,
}

impl MappingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the mapper for data objects of type `D`, stored as entities
    /// named `logical_name`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidLogicalName`] unless the name is a lowercase
    ///   identifier (`[a-z_][a-z0-9_]*`)
    /// - [`RegistryError::DuplicateRegistration`] if `D` is already registered
    pub fn register<D: DataObject>(
        &mut self,
        logical_name: &str,
        mapper: Arc<dyn EntityMapper<D>>,
    ) -> Result<(), RegistryError> {
        let type_name = type_name::<D>();
        if !is_valid_logical_name(logical_name) {
            return Err(RegistryError::InvalidLogicalName {
                name: logical_name.to_owned(),
                type_name,
            });
        }
        if let Some(existing) = self.entries.get(&TypeId::of::<D>()) {
            return Err(RegistryError::DuplicateRegistration {
                type_name,
                logical_name: existing.logical_name.clone(),
            });
        }

        tracing::debug!(type_name, logical_name, "registered entity mapping");
        self.entries.insert(
            TypeId::of::<D>(),
            Registration {
                logical_name: logical_name.to_owned(),
                mapper: Box::new(mapper),
            },
        );
        Ok(())
    }

    /// Builder-style [`MappingRegistry::register`].
    ///
    /// # Errors
    ///
    /// Same as [`MappingRegistry::register`].
    pub fn with<D: DataObject>(
        mut self,
        logical_name: &str,
        mapper: Arc<dyn EntityMapper<D>>,
    ) -> Result<Self, RegistryError> {
        self.register(logical_name, mapper)?;
        Ok(self)
    }

    /// Logical name and mapper registered for `D`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRegistered`] when `D` has no mapping.
    pub fn resolve<D: DataObject>(
        &self,
    ) -> Result<(&str, Arc<dyn EntityMapper<D>>), RegistryError> {
        let not_registered = || RegistryError::NotRegistered {
            type_name: type_name::<D>(),
        };
        let entry = self.entries.get(&TypeId::of::<D>()).ok_or_else(not_registered)?;
        let mapper = entry
            .mapper
            .downcast_ref::<Arc<dyn EntityMapper<D>>>()
            .ok_or_else(not_registered)?;
        Ok((entry.logical_name.as_str(), Arc::clone(mapper)))
    }

    #[must_use]
    pub fn logical_name<D: DataObject>(&self) -> Option<&str> {
        self.entries
            .get(&TypeId::of::<D>())
            .map(|e| e.logical_name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_valid_logical_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
