//! Structured query → native query translation.

mod builder;
mod error;

pub use builder::QueryExpressionBuilder;
pub use error::{QueryClause, QueryError};

#[cfg(test)]
mod tests;
