//! Query expression builder.
//!
//! Translates a [`QueryRequest`] over data-object fields into a
//! [`NativeQuery`] over backend attributes.
//!
//! ## Filter translation
//!
//! | Request node | Native form |
//! |--------------|-------------|
//! | `and(..)` / `or(..)` | nested [`FilterExpression`] with the same operator |
//! | `f eq v` .. `f ge v` | `Equal` .. `GreaterEqual` condition |
//! | `f eq null` / `f ne null` | `Null` / `NotNull` condition |
//! | `contains(f, s)` | `Like '%s%'` with `%`, `_`, `[` escaped |
//! | `startswith(f, s)` / `endswith(f, s)` | `BeginsWith` / `EndsWith` |
//! | `f in (..)` | `In` condition |
//! | `not(..)` | pushed down: leaf operator negated, groups by De Morgan |
//!
//! Null handling follows SQL: a comparison against a null attribute is
//! unknown, so pushing `not` down to the leaves keeps the result set exact.
//!
//! ## Paging
//!
//! | skip | top | Result |
//! |------|-----|--------|
//! | none/0 | none | no paging |
//! | > 0 | none | `SkipWithoutTop` |
//! | any | 0 | empty window, the query yields nothing |
//! | k·top | top | page `k + 1` of size `top` |
//! | other | top | `MisalignedPaging` |
//!
//! Every field reference resolves through the [`FieldResolver`]; anything
//! unmapped fails the whole translation.

use crm_bridge_sdk::{
    ColumnSet, CompareOp, ConditionExpression, ConditionOperator, FieldResolver, FilterExpr,
    FilterExpression, LogicalOperator, NativeQuery, OrderExpression, OrderType, PagingInfo,
    QueryRequest, SortDirection, StringFunction, Value,
};

use super::error::{QueryClause, QueryError};

/// Builds native queries; holds the configured maximum page size.
#[derive(Debug, Clone, Copy)]
pub struct QueryExpressionBuilder {
    max_page_size: u32,
}

/// A translated filter node: either a single condition or a group.
enum Node {
    Condition(ConditionExpression),
    Group(FilterExpression),
}

impl QueryExpressionBuilder {
    #[must_use]
    pub fn new(max_page_size: u32) -> Self {
        Self { max_page_size }
    }

    #[must_use]
    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    /// Translate `request` for the entity `entity_name`.
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError`] naming the offending clause or field.
    pub fn build<R: FieldResolver + ?Sized>(
        &self,
        entity_name: &str,
        request: &QueryRequest,
        resolver: &R,
    ) -> Result<NativeQuery, QueryError> {
        let paging = self.paging(request.skip, request.top)?;

        let criteria = match &request.filter {
            None => FilterExpression::default(),
            Some(expr) => match translate(expr, false, resolver)? {
                Node::Group(group) => group,
                Node::Condition(condition) => FilterExpression {
                    filter_operator: LogicalOperator::And,
                    conditions: vec![condition],
                    filters: Vec::new(),
                },
            },
        };

        let column_set = match &request.select {
            None => ColumnSet::All,
            Some(fields) => columns(fields, resolver)?,
        };

        let orders = request
            .order_by
            .iter()
            .map(|key| {
                let attribute = resolve(resolver, QueryClause::OrderBy, &key.field)?;
                Ok(OrderExpression {
                    attribute_name: attribute.to_owned(),
                    order_type: match key.direction {
                        SortDirection::Asc => OrderType::Ascending,
                        SortDirection::Desc => OrderType::Descending,
                    },
                })
            })
            .collect::<Result<Vec<_>, QueryError>>()?;

        Ok(NativeQuery {
            entity_name: entity_name.to_owned(),
            criteria,
            column_set,
            orders,
            paging,
        })
    }

    fn paging(&self, skip: Option<i64>, top: Option<i64>) -> Result<Option<PagingInfo>, QueryError> {
        if let Some(value) = skip.filter(|s| *s < 0) {
            return Err(QueryError::Negative {
                clause: QueryClause::Skip,
                value,
            });
        }
        if let Some(value) = top.filter(|t| *t < 0) {
            return Err(QueryError::Negative {
                clause: QueryClause::Top,
                value,
            });
        }

        let skip = skip.unwrap_or(0);
        let Some(top) = top else {
            if skip > 0 {
                return Err(QueryError::SkipWithoutTop { skip });
            }
            return Ok(None);
        };

        if top > i64::from(self.max_page_size) {
            return Err(QueryError::PageTooLarge {
                top,
                max: self.max_page_size,
            });
        }
        let count = u32::try_from(top).map_err(|_| QueryError::PageTooLarge {
            top,
            max: self.max_page_size,
        })?;
        if count == 0 {
            return Ok(Some(PagingInfo {
                count: 0,
                page_number: 1,
            }));
        }

        if skip.checked_rem(top) != Some(0) {
            return Err(QueryError::MisalignedPaging { skip, top });
        }
        let page_number = skip
            .checked_div(top)
            .and_then(|pages| pages.checked_add(1))
            .and_then(|page| u32::try_from(page).ok())
            .ok_or(QueryError::PageOutOfRange { skip })?;

        Ok(Some(PagingInfo { count, page_number }))
    }
}

fn resolve<'r, R: FieldResolver + ?Sized>(
    resolver: &'r R,
    clause: QueryClause,
    field: &str,
) -> Result<&'r str, QueryError> {
    resolver.resolve_backend_field(field).ok_or_else(|| {
        tracing::warn!(%clause, field, "query references an unmapped field");
        QueryError::unmapped(clause, field)
    })
}

fn columns<R: FieldResolver + ?Sized>(
    fields: &[String],
    resolver: &R,
) -> Result<ColumnSet, QueryError> {
    if fields.is_empty() {
        return Err(QueryError::EmptySelect);
    }
    let mut columns: Vec<String> = Vec::with_capacity(fields.len());
    for field in fields {
        let attribute = resolve(resolver, QueryClause::Select, field)?;
        if !columns.iter().any(|c| c == attribute) {
            columns.push(attribute.to_owned());
        }
    }
    Ok(ColumnSet::Columns(columns))
}

/// Translate `expr`, negated when `negate` is set.
fn translate<R: FieldResolver + ?Sized>(
    expr: &FilterExpr,
    negate: bool,
    resolver: &R,
) -> Result<Node, QueryError> {
    match expr {
        FilterExpr::And(children) => group(LogicalOperator::And, children, negate, resolver),
        FilterExpr::Or(children) => group(LogicalOperator::Or, children, negate, resolver),
        FilterExpr::Not(inner) => translate(inner, !negate, resolver),
        FilterExpr::Compare { field, op, value } => {
            compare(field, *op, value, negate, resolver).map(Node::Condition)
        }
        FilterExpr::Function {
            function,
            field,
            value,
        } => {
            let attribute = resolve(resolver, QueryClause::Filter, field)?;
            let converted = literal(resolver, field, attribute, &Value::String(value.clone()))?;
            let Value::String(text) = converted else {
                return Err(QueryError::InvalidLiteral {
                    field: field.clone(),
                    message: format!("{}() needs a string operand", function.as_str()),
                });
            };
            let (operator, operand) = match function {
                StringFunction::Contains => {
                    (ConditionOperator::Like, format!("%{}%", escape_like(&text)))
                }
                StringFunction::StartsWith => (ConditionOperator::BeginsWith, text),
                StringFunction::EndsWith => (ConditionOperator::EndsWith, text),
            };
            Ok(Node::Condition(ConditionExpression::new(
                attribute,
                negated_if(operator, negate),
                vec![Value::String(operand)],
            )))
        }
        FilterExpr::In { field, values } => {
            let attribute = resolve(resolver, QueryClause::Filter, field)?;
            if values.is_empty() {
                return Err(QueryError::EmptyInList {
                    field: field.clone(),
                });
            }
            if values.iter().any(Value::is_null) {
                return Err(QueryError::NullInList {
                    field: field.clone(),
                });
            }
            let values = values
                .iter()
                .map(|v| literal(resolver, field, attribute, v))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Node::Condition(ConditionExpression::new(
                attribute,
                negated_if(ConditionOperator::In, negate),
                values,
            )))
        }
    }
}

fn group<R: FieldResolver + ?Sized>(
    operator: LogicalOperator,
    children: &[FilterExpr],
    negate: bool,
    resolver: &R,
) -> Result<Node, QueryError> {
    if children.is_empty() {
        return Err(QueryError::EmptyGroup { operator });
    }
    // De Morgan: not(a and b) = not a or not b
    let operator = if negate { operator.flipped() } else { operator };
    let mut filter = FilterExpression::new(operator);
    for child in children {
        match translate(child, negate, resolver)? {
            Node::Condition(c) => filter.conditions.push(c),
            Node::Group(g) => filter.filters.push(g),
        }
    }
    Ok(Node::Group(filter))
}

fn compare<R: FieldResolver + ?Sized>(
    field: &str,
    op: CompareOp,
    value: &Value,
    negate: bool,
    resolver: &R,
) -> Result<ConditionExpression, QueryError> {
    let attribute = resolve(resolver, QueryClause::Filter, field)?;

    if value.is_null() {
        let operator = match op {
            CompareOp::Eq => ConditionOperator::Null,
            CompareOp::Ne => ConditionOperator::NotNull,
            _ => return Err(QueryError::null_ordering(field, op)),
        };
        return Ok(ConditionExpression::new(
            attribute,
            negated_if(operator, negate),
            Vec::new(),
        ));
    }

    let operator = match op {
        CompareOp::Eq => ConditionOperator::Equal,
        CompareOp::Ne => ConditionOperator::NotEqual,
        CompareOp::Lt => ConditionOperator::LessThan,
        CompareOp::Le => ConditionOperator::LessEqual,
        CompareOp::Gt => ConditionOperator::GreaterThan,
        CompareOp::Ge => ConditionOperator::GreaterEqual,
    };
    let value = literal(resolver, field, attribute, value)?;
    Ok(ConditionExpression::new(
        attribute,
        negated_if(operator, negate),
        vec![value],
    ))
}

fn literal<R: FieldResolver + ?Sized>(
    resolver: &R,
    field: &str,
    attribute: &str,
    value: &Value,
) -> Result<Value, QueryError> {
    resolver
        .to_backend_value(attribute, value.clone())
        .map_err(|e| QueryError::InvalidLiteral {
            field: field.to_owned(),
            message: e.to_string(),
        })
}

fn negated_if(operator: ConditionOperator, negate: bool) -> ConditionOperator {
    if negate {
        operator.negated()
    } else {
        operator
    }
}

/// Escape LIKE wildcards so `value` matches literally.
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '[' => out.push_str("[[]"),
            '%' => out.push_str("[%]"),
            '_' => out.push_str("[_]"),
            c => out.push(c),
        }
    }
    out
}
