//! Domain layer for the CRM bridge.

pub mod connection;
pub mod error;
pub mod local_client;
pub mod manager;
pub mod query;
pub mod registry;

pub use connection::{ConnectionSettings, RequestScope, StoreConnector};
pub use error::DomainError;
pub use local_client::RecordsLocalClient;
pub use manager::DomainManager;
pub use registry::{MappingRegistry, RegistryError};
