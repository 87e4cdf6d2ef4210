//! OData system query options.
//!
//! [`ODataParams`] holds the raw `$filter`, `$orderby`, `$select`, `$top` and
//! `$skip` options as they arrive on a request. Converting it into a
//! [`QueryRequest`] parses `$filter` with `odata-params` and lowers the parsed
//! tree onto [`FilterExpr`]. Field names are not resolved here; that happens
//! when the request is translated for a concrete entity.

use std::str::FromStr;

use odata_params::filters::{CompareOperator, Expr, Value as ODataValue, parse_str};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::error::CrmBridgeError;
use crate::models::Value;
use crate::query::{CompareOp, FilterExpr, OrderKey, QueryRequest, SortDirection, StringFunction};

/// Raw OData query options, deserializable from a query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ODataParams {
    #[serde(rename = "$filter")]
    pub filter: Option<String>,
    #[serde(rename = "$orderby")]
    pub orderby: Option<String>,
    #[serde(rename = "$select")]
    pub select: Option<String>,
    #[serde(rename = "$top")]
    pub top: Option<i64>,
    #[serde(rename = "$skip")]
    pub skip: Option<i64>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ODataError {
    #[error("invalid $filter: {0}")]
    Filter(String),

    #[error("unsupported function '{0}' in $filter")]
    UnsupportedFunction(String),

    #[error("unsupported literal in $filter: {0}")]
    UnsupportedLiteral(String),

    #[error("invalid $orderby: {0}")]
    OrderBy(String),
}

impl From<ODataError> for CrmBridgeError {
    fn from(e: ODataError) -> Self {
        CrmBridgeError::validation(e.to_string())
    }
}

impl TryFrom<&ODataParams> for QueryRequest {
    type Error = ODataError;

    fn try_from(params: &ODataParams) -> Result<Self, Self::Error> {
        let filter = match params.filter.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_filter(raw)?),
        };
        let order_by = match params.orderby.as_deref() {
            None => Vec::new(),
            Some(raw) => parse_orderby(raw)?,
        };
        let select = params.select.as_deref().map(parse_select);

        Ok(QueryRequest {
            filter,
            order_by,
            select,
            skip: params.skip,
            top: params.top,
        })
    }
}

impl TryFrom<ODataParams> for QueryRequest {
    type Error = ODataError;

    fn try_from(params: ODataParams) -> Result<Self, Self::Error> {
        QueryRequest::try_from(&params)
    }
}

/// Parse a `$filter` expression into a [`FilterExpr`].
///
/// # Errors
///
/// Returns [`ODataError`] for syntax errors, comparisons that are not
/// between a field and a literal, unknown functions and unsupported literals.
pub fn parse_filter(raw: &str) -> Result<FilterExpr, ODataError> {
    let expr = parse_str(raw).map_err(|e| ODataError::Filter(e.to_string()))?;
    lower(expr)
}

fn lower(expr: Expr) -> Result<FilterExpr, ODataError> {
    match expr {
        Expr::And(left, right) => Ok(FilterExpr::And(vec![lower(*left)?, lower(*right)?])),
        Expr::Or(left, right) => Ok(FilterExpr::Or(vec![lower(*left)?, lower(*right)?])),
        Expr::Not(inner) => Ok(FilterExpr::Not(Box::new(lower(*inner)?))),
        Expr::Compare(left, op, right) => lower_compare(*left, op, *right),
        Expr::In(left, items) => {
            let Expr::Identifier(field) = *left else {
                return Err(ODataError::Filter(
                    "left side of 'in' must be a field".to_owned(),
                ));
            };
            let values = items
                .into_iter()
                .map(|item| match item {
                    Expr::Value(v) => lower_value(v),
                    _ => Err(ODataError::Filter(format!(
                        "'in' list for '{field}' must contain only literals"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FilterExpr::In { field, values })
        }
        Expr::Function(name, args) => lower_function(&name, args),
        Expr::Identifier(field) => Err(ODataError::Filter(format!(
            "'{field}' is not a predicate"
        ))),
        Expr::Value(_) => Err(ODataError::Filter(
            "a bare literal is not a predicate".to_owned(),
        )),
    }
}

fn lower_compare(left: Expr, op: CompareOperator, right: Expr) -> Result<FilterExpr, ODataError> {
    let op = compare_op(op);
    match (left, right) {
        (Expr::Identifier(field), Expr::Value(v)) => Ok(FilterExpr::Compare {
            field,
            op,
            value: lower_value(v)?,
        }),
        // `5 lt age` reads as `age gt 5`
        (Expr::Value(v), Expr::Identifier(field)) => Ok(FilterExpr::Compare {
            field,
            op: op.mirrored(),
            value: lower_value(v)?,
        }),
        _ => Err(ODataError::Filter(format!(
            "'{}' must compare a field with a literal",
            op.as_str()
        ))),
    }
}

#[allow(clippy::needless_pass_by_value)]
fn compare_op(op: CompareOperator) -> CompareOp {
    match op {
        CompareOperator::Equal => CompareOp::Eq,
        CompareOperator::NotEqual => CompareOp::Ne,
        CompareOperator::LessThan => CompareOp::Lt,
        CompareOperator::LessOrEqual => CompareOp::Le,
        CompareOperator::GreaterThan => CompareOp::Gt,
        CompareOperator::GreaterOrEqual => CompareOp::Ge,
    }
}

fn lower_function(name: &str, args: Vec<Expr>) -> Result<FilterExpr, ODataError> {
    let function = match name {
        "contains" => StringFunction::Contains,
        "startswith" => StringFunction::StartsWith,
        "endswith" => StringFunction::EndsWith,
        other => return Err(ODataError::UnsupportedFunction(other.to_owned())),
    };

    let mut args = args.into_iter();
    match (args.next(), args.next(), args.next()) {
        (Some(Expr::Identifier(field)), Some(Expr::Value(ODataValue::String(value))), None) => {
            Ok(FilterExpr::Function {
                function,
                field,
                value,
            })
        }
        _ => Err(ODataError::Filter(format!(
            "{}() expects a field and a string literal",
            function.as_str()
        ))),
    }
}

fn lower_value(value: ODataValue) -> Result<Value, ODataError> {
    match value {
        ODataValue::Null => Ok(Value::Null),
        ODataValue::Bool(b) => Ok(Value::Bool(b)),
        ODataValue::Number(n) => {
            let text = n.to_string();
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Value::Int(i));
            }
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map(Value::Decimal)
                .map_err(|_| ODataError::UnsupportedLiteral(text))
        }
        ODataValue::Uuid(u) => Ok(Value::Uuid(u)),
        ODataValue::DateTime(dt) => Ok(Value::DateTime(dt)),
        ODataValue::Date(d) => Ok(Value::Date(d)),
        ODataValue::String(s) => Ok(Value::String(s)),
        #[allow(unreachable_patterns)]
        _ => Err(ODataError::UnsupportedLiteral(
            "time-of-day literals are not supported".to_owned(),
        )),
    }
}

fn parse_orderby(raw: &str) -> Result<Vec<OrderKey>, ODataError> {
    raw.split(',')
        .map(|item| {
            let mut parts = item.split_whitespace();
            let field = parts
                .next()
                .ok_or_else(|| ODataError::OrderBy("empty sort key".to_owned()))?;
            let direction = match parts.next() {
                None => SortDirection::Asc,
                Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
                Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                Some(d) => {
                    return Err(ODataError::OrderBy(format!(
                        "unknown direction '{d}' for '{field}'"
                    )));
                }
            };
            if parts.next().is_some() {
                return Err(ODataError::OrderBy(format!("malformed sort key '{}'", item.trim())));
            }
            Ok(OrderKey {
                field: field.to_owned(),
                direction,
            })
        })
        .collect()
}

/// Comma separated field list; blank entries are dropped so `$select=` yields
/// an empty projection, which translation rejects.
fn parse_select(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
