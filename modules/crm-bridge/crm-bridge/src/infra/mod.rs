//! Capability implementations shipped with the module.

pub mod memory_store;
pub mod oauth;
pub mod static_token;

pub use memory_store::MemoryStore;
pub use oauth::OAuthCredentialProvider;
pub use static_token::{StaticCredentialProvider, StaticTokenConfig};
