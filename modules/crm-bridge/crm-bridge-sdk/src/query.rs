//! Protocol-level query model.
//!
//! A [`QueryRequest`] is what the API layer hands to the records client: a
//! filter tree over data-object field names, sort keys, an optional
//! projection and the raw `$skip`/`$top` window. Field names are those of the
//! data object; translation to backend attribute names happens later.

use crate::models::Value;

/// Binary comparison between a field and a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Operator to use when the operands are swapped (`5 lt x` is `x gt 5`).
    #[must_use]
    pub fn mirrored(self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
        }
    }

    #[must_use]
    pub fn is_ordering(self) -> bool {
        !matches!(self, Self::Eq | Self::Ne)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
        }
    }
}

/// String predicate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringFunction {
    Contains,
    StartsWith,
    EndsWith,
}

impl StringFunction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
        }
    }
}

/// Filter predicate tree.
///
/// Comparisons against [`Value::Null`] express null checks (`x eq null`).
/// Nulls otherwise follow SQL semantics: a comparison with a null field is
/// neither true nor false, so `not (x lt 5)` does not match null rows.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    Function {
        function: StringFunction,
        field: String,
        value: String,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
}

impl FilterExpr {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::compare(field, CompareOp::Eq, Value::Null)
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::compare(field, CompareOp::Ne, Value::Null)
    }

    pub fn function(
        function: StringFunction,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Function {
            function,
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::function(StringFunction::Contains, field, value)
    }

    pub fn starts_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::function(StringFunction::StartsWith, field, value)
    }

    pub fn ends_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::function(StringFunction::EndsWith, field, value)
    }

    pub fn in_list<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn and(children: Vec<FilterExpr>) -> Self {
        Self::And(children)
    }

    #[must_use]
    pub fn or(children: Vec<FilterExpr>) -> Self {
        Self::Or(children)
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: FilterExpr) -> Self {
        Self::Not(Box::new(inner))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One sort key; the first key in a request is the primary sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Structured query over one data-object type.
///
/// `skip` and `top` are kept as the signed integers the protocol carries so
/// that negative values can be rejected with a proper validation error.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryRequest {
    pub filter: Option<FilterExpr>,
    pub order_by: Vec<OrderKey>,
    /// `None` selects every mapped column.
    pub select: Option<Vec<String>>,
    pub skip: Option<i64>,
    pub top: Option<i64>,
}

impl QueryRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn order_by(mut self, key: OrderKey) -> Self {
        self.order_by.push(key);
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn top(mut self, top: i64) -> Self {
        self.top = Some(top);
        self
    }
}
