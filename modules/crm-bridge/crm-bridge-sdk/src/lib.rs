//! CRM Bridge SDK
//!
//! This crate provides the public contract of the `crm_bridge` module:
//!
//! - [`RecordsClient`] - Inbound CRUD + query surface, one per data-object type
//! - [`DataObject`], [`Entity`], [`Value`] - Transport and backend record models
//! - [`QueryRequest`] / [`FilterExpr`] - Protocol-level query model
//! - [`NativeQuery`] - The store's condition/column/order/paging representation
//! - [`EntityMapper`], [`CredentialProvider`], [`StoreClient`] - Capabilities the
//!   module consumes from its host
//! - [`CrmBridgeError`] - Error type returned to callers
//!
//! With the `odata` feature (default), [`odata::ODataParams`] converts raw
//! `$filter`/`$orderby`/`$select`/`$top`/`$skip` options into a [`QueryRequest`].
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod credentials;
pub mod error;
pub mod mapper;
pub mod models;
pub mod native;
pub mod query;
pub mod store;

#[cfg(feature = "odata")]
pub mod odata;

pub use api::RecordsClient;
pub use credentials::{AccessToken, AuthMode, AuthModeKind, CredentialError, CredentialProvider};
pub use error::CrmBridgeError;
pub use mapper::{EntityMapper, FieldResolver, MappingError};
pub use models::{DataObject, Entity, Value};
pub use native::{
    ColumnSet, ConditionExpression, ConditionOperator, FilterExpression, LogicalOperator,
    NativeQuery, OrderExpression, OrderType, PagingInfo,
};
pub use query::{CompareOp, FilterExpr, OrderKey, QueryRequest, SortDirection, StringFunction};
pub use store::{StoreClient, StoreError, StoreSession};
