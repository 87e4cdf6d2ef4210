use std::fmt;

use crm_bridge_sdk::{CompareOp, LogicalOperator};
use thiserror::Error;

/// Part of a query request a translation error was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryClause {
    Filter,
    OrderBy,
    Select,
    Skip,
    Top,
}

impl fmt::Display for QueryClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Filter => "filter",
            Self::OrderBy => "orderby",
            Self::Select => "select",
            Self::Skip => "skip",
            Self::Top => "top",
        })
    }
}

/// Errors raised while translating a query request into a native query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("{clause}: field '{field}' is not mapped")]
    UnmappedField { clause: QueryClause, field: String },

    #[error("filter: invalid literal for '{field}': {message}")]
    InvalidLiteral { field: String, message: String },

    #[error("filter: '{field} {op} null' is not a valid comparison")]
    NullOrdering { field: String, op: &'static str },

    #[error("filter: empty '{operator}' group")]
    EmptyGroup { operator: LogicalOperator },

    #[error("filter: 'in' list for '{field}' is empty")]
    EmptyInList { field: String },

    #[error("filter: 'in' list for '{field}' contains null")]
    NullInList { field: String },

    #[error("select: projection lists no fields")]
    EmptySelect,

    #[error("{clause}: must not be negative (got {value})")]
    Negative { clause: QueryClause, value: i64 },

    #[error("skip: {skip} is not a multiple of top ({top})")]
    MisalignedPaging { skip: i64, top: i64 },

    #[error("skip: {skip} requires top")]
    SkipWithoutTop { skip: i64 },

    #[error("top: {top} exceeds the maximum page size of {max}")]
    PageTooLarge { top: i64, max: u32 },

    #[error("skip: page for skip {skip} is out of range")]
    PageOutOfRange { skip: i64 },
}

impl QueryError {
    pub(crate) fn unmapped(clause: QueryClause, field: impl Into<String>) -> Self {
        Self::UnmappedField {
            clause,
            field: field.into(),
        }
    }

    pub(crate) fn null_ordering(field: impl Into<String>, op: CompareOp) -> Self {
        Self::NullOrdering {
            field: field.into(),
            op: op.as_str(),
        }
    }

    /// `true` for paging errors, which the store contract calls misaligned.
    #[must_use]
    pub fn is_misaligned_paging(&self) -> bool {
        matches!(
            self,
            Self::MisalignedPaging { .. } | Self::SkipWithoutTop { .. }
        )
    }
}
