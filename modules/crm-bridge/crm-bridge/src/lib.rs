//! CRM Bridge Module
//!
//! Exposes a remote record store (a CRM-style system of typed entities with
//! attributes) through a uniform CRUD + query surface.
//!
//! ## Architecture
//!
//! ### Contract Layer (`crm-bridge-sdk`)
//! - `RecordsClient<D>` trait, one client per data-object type
//! - Record models: `DataObject`, `Entity`, `Value`
//! - Query models: `QueryRequest` (protocol level) and `NativeQuery` (store level)
//! - Capabilities consumed from the host: `EntityMapper`, `CredentialProvider`,
//!   `StoreClient`/`StoreSession`
//! - Error type: `CrmBridgeError`
//!
//! ### Domain Layer (`crm_bridge::domain`)
//! - `manager/` - CRUD orchestration with optimistic concurrency
//! - `query/` - `QueryRequest` → `NativeQuery` translation
//! - `connection.rs` - request-scoped, lazily opened store session
//! - `registry.rs` - data-object type → (logical entity name, mapper)
//! - `local_client.rs` - `RecordsClient` implementation
//!
//! ### Infrastructure Layer (`crm_bridge::infra`)
//! - `oauth.rs` - OAuth2 credential provider (client credentials, password,
//!   on-behalf-of)
//! - `static_token.rs` - pre-configured tokens for development
//! - `memory_store.rs` - in-process store executing native queries
//!
//! ## Bootstrap
//!
//! ```ignore
//! let registry = MappingRegistry::new().with::<Account>("account", Arc::new(AccountMapper))?;
//! let bridge = CrmBridge::with_oauth(&CrmBridgeConfig::load("crm_bridge.yaml")?, registry, store)?;
//! let accounts = bridge.client::<Account>()?;
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

// === PUBLIC API (from SDK) ===
pub use crm_bridge_sdk::{
    CrmBridgeError, DataObject, Entity, EntityMapper, FieldResolver, FilterExpr, MappingError,
    OrderKey, QueryRequest, RecordsClient, Value,
};

// === MODULE DEFINITION ===
pub mod module;
pub use module::CrmBridge;

pub use config::CrmBridgeConfig;
pub use domain::MappingRegistry;

// === INTERNAL MODULES ===
// Exposed for tests and advanced wiring; prefer the SDK types.
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;

#[cfg(test)]
mod test_support;
