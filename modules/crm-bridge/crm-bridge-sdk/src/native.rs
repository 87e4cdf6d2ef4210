//! The store's native query representation.
//!
//! Mirrors the record store's query-expression model: a condition tree of
//! AND/OR filter groups over backend attribute names, a column set, an order
//! list and a page-based paging descriptor. Store clients execute these
//! directly; nothing in here refers to data-object field names.

use std::fmt;

use crate::models::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
        }
    }
}

/// Condition operators understood by the store.
///
/// `Like`/`NotLike` patterns use `%` and `_` wildcards; a literal wildcard
/// character is escaped as `[%]`, `[_]` (and `[` as `[[]`). `BeginsWith` and
/// `EndsWith` take the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionOperator {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Like,
    NotLike,
    BeginsWith,
    DoesNotBeginWith,
    EndsWith,
    DoesNotEndWith,
    Null,
    NotNull,
    In,
    NotIn,
}

impl ConditionOperator {
    /// The operator matching exactly the non-null rows this one rejects.
    #[must_use]
    pub fn negated(self) -> Self {
        match self {
            Self::Equal => Self::NotEqual,
            Self::NotEqual => Self::Equal,
            Self::LessThan => Self::GreaterEqual,
            Self::GreaterEqual => Self::LessThan,
            Self::LessEqual => Self::GreaterThan,
            Self::GreaterThan => Self::LessEqual,
            Self::Like => Self::NotLike,
            Self::NotLike => Self::Like,
            Self::BeginsWith => Self::DoesNotBeginWith,
            Self::DoesNotBeginWith => Self::BeginsWith,
            Self::EndsWith => Self::DoesNotEndWith,
            Self::DoesNotEndWith => Self::EndsWith,
            Self::Null => Self::NotNull,
            Self::NotNull => Self::Null,
            Self::In => Self::NotIn,
            Self::NotIn => Self::In,
        }
    }

    /// Number of operand values the operator takes (`None` = one or more).
    #[must_use]
    pub fn arity(self) -> Option<usize> {
        match self {
            Self::Null | Self::NotNull => Some(0),
            Self::In | Self::NotIn => None,
            _ => Some(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionExpression {
    pub attribute_name: String,
    pub operator: ConditionOperator,
    pub values: Vec<Value>,
}

impl ConditionExpression {
    pub fn new(
        attribute_name: impl Into<String>,
        operator: ConditionOperator,
        values: Vec<Value>,
    ) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            operator,
            values,
        }
    }
}

/// A group of conditions and nested groups joined by one logical operator.
///
/// An empty group places no restriction on the result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterExpression {
    pub filter_operator: LogicalOperator,
    pub conditions: Vec<ConditionExpression>,
    pub filters: Vec<FilterExpression>,
}

impl FilterExpression {
    #[must_use]
    pub fn new(filter_operator: LogicalOperator) -> Self {
        Self {
            filter_operator,
            conditions: Vec::new(),
            filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.filters.is_empty()
    }

    /// Depth of the deepest nested group (a flat group has depth 1).
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.filters.iter().map(Self::depth).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnSet {
    #[default]
    All,
    Columns(Vec<String>),
}

impl ColumnSet {
    #[must_use]
    pub fn includes(&self, attribute: &str) -> bool {
        match self {
            Self::All => true,
            Self::Columns(cols) => cols.iter().any(|c| c == attribute),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderExpression {
    pub attribute_name: String,
    pub order_type: OrderType,
}

/// Page-based window: `count` records per page, 1-based `page_number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingInfo {
    pub count: u32,
    pub page_number: u32,
}

impl PagingInfo {
    /// Number of records preceding the page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page_number.saturating_sub(1)) * u64::from(self.count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeQuery {
    pub entity_name: String,
    pub criteria: FilterExpression,
    pub column_set: ColumnSet,
    pub orders: Vec<OrderExpression>,
    /// `None` returns every matching record.
    pub paging: Option<PagingInfo>,
}

impl NativeQuery {
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            criteria: FilterExpression::default(),
            column_set: ColumnSet::All,
            orders: Vec::new(),
            paging: None,
        }
    }

    /// `true` when the paging window is empty, so the result is known to be
    /// empty without asking the store.
    #[must_use]
    pub fn yields_nothing(&self) -> bool {
        self.paging.is_some_and(|p| p.count == 0)
    }
}
