#![allow(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(coverage_nightly, coverage(off))]

use crm_bridge_sdk::{
    ColumnSet, ConditionExpression, ConditionOperator, FieldResolver, FilterExpr, LogicalOperator,
    MappingError, NativeQuery, OrderExpression, OrderKey, OrderType, PagingInfo, QueryRequest,
    Value,
};

use super::{QueryClause, QueryError, QueryExpressionBuilder};

/// Resolver over a fixed field table; `age` literals must be integers and
/// `email` literals are stored lowercase.
struct Fields;

impl FieldResolver for Fields {
    fn resolve_backend_field(&self, field: &str) -> Option<&str> {
        match field {
            "id" => Some("contactid"),
            "name" => Some("fullname"),
            "age" => Some("new_age"),
            "city" => Some("address1_city"),
            "email" => Some("emailaddress1"),
            _ => None,
        }
    }

    fn to_backend_value(&self, backend_field: &str, value: Value) -> Result<Value, MappingError> {
        if backend_field == "new_age" && value.as_i64().is_none() {
            return Err(MappingError::invalid_value(backend_field, "expected an integer"));
        }
        if backend_field == "emailaddress1"
            && let Value::String(text) = &value
        {
            return Ok(Value::String(text.to_lowercase()));
        }
        Ok(value)
    }
}

fn build(request: &QueryRequest) -> Result<NativeQuery, QueryError> {
    QueryExpressionBuilder::new(5000).build("contact", request, &Fields)
}

fn cond(attribute: &str, operator: ConditionOperator, values: Vec<Value>) -> ConditionExpression {
    ConditionExpression::new(attribute, operator, values)
}

#[test]
fn empty_request_is_unrestricted() {
    let q = build(&QueryRequest::new()).unwrap();
    assert_eq!(q.entity_name, "contact");
    assert!(q.criteria.is_empty());
    assert_eq!(q.column_set, ColumnSet::All);
    assert!(q.orders.is_empty());
    assert_eq!(q.paging, None);
    assert!(!q.yields_nothing());
}

#[test]
fn single_comparison_becomes_and_group_with_one_condition() {
    let q = build(&QueryRequest::new().filter(FilterExpr::eq("name", "Acme"))).unwrap();
    assert_eq!(q.criteria.filter_operator, LogicalOperator::And);
    assert_eq!(
        q.criteria.conditions,
        vec![cond("fullname", ConditionOperator::Equal, vec!["Acme".into()])]
    );
    assert!(q.criteria.filters.is_empty());
}

#[test]
fn comparison_operators_map_one_to_one() {
    let cases = [
        (FilterExpr::eq("age", 1_i64), ConditionOperator::Equal),
        (FilterExpr::ne("age", 1_i64), ConditionOperator::NotEqual),
        (FilterExpr::lt("age", 1_i64), ConditionOperator::LessThan),
        (FilterExpr::le("age", 1_i64), ConditionOperator::LessEqual),
        (FilterExpr::gt("age", 1_i64), ConditionOperator::GreaterThan),
        (FilterExpr::ge("age", 1_i64), ConditionOperator::GreaterEqual),
    ];
    for (expr, expected) in cases {
        let q = build(&QueryRequest::new().filter(expr)).unwrap();
        assert_eq!(q.criteria.conditions[0].operator, expected);
        assert_eq!(q.criteria.conditions[0].values, vec![Value::Int(1)]);
    }
}

#[test]
fn null_checks() {
    let q = build(&QueryRequest::new().filter(FilterExpr::is_null("email"))).unwrap();
    assert_eq!(
        q.criteria.conditions,
        vec![cond("emailaddress1", ConditionOperator::Null, vec![])]
    );

    let q = build(&QueryRequest::new().filter(FilterExpr::is_not_null("email"))).unwrap();
    assert_eq!(q.criteria.conditions[0].operator, ConditionOperator::NotNull);

    let err = build(&QueryRequest::new().filter(FilterExpr::gt("age", Value::Null))).unwrap_err();
    assert!(matches!(err, QueryError::NullOrdering { op: "gt", .. }));
}

#[test]
fn string_functions() {
    let q = build(&QueryRequest::new().filter(FilterExpr::contains("name", "10%"))).unwrap();
    assert_eq!(
        q.criteria.conditions,
        vec![cond(
            "fullname",
            ConditionOperator::Like,
            vec!["%10[%]%".into()]
        )]
    );

    let q = build(&QueryRequest::new().filter(FilterExpr::starts_with("name", "Ac"))).unwrap();
    assert_eq!(
        q.criteria.conditions,
        vec![cond("fullname", ConditionOperator::BeginsWith, vec!["Ac".into()])]
    );

    let q = build(&QueryRequest::new().filter(FilterExpr::ends_with("name", "me"))).unwrap();
    assert_eq!(
        q.criteria.conditions,
        vec![cond("fullname", ConditionOperator::EndsWith, vec!["me".into()])]
    );
}

#[test]
fn string_function_operands_go_through_value_conversion() {
    let q = build(&QueryRequest::new().filter(FilterExpr::contains("email", "@Example.COM")))
        .unwrap();
    assert_eq!(
        q.criteria.conditions,
        vec![cond(
            "emailaddress1",
            ConditionOperator::Like,
            vec!["%@example.com%".into()]
        )]
    );

    let q = build(&QueryRequest::new().filter(FilterExpr::starts_with("email", "ADA"))).unwrap();
    assert_eq!(q.criteria.conditions[0].values, vec![Value::from("ada")]);

    let err =
        build(&QueryRequest::new().filter(FilterExpr::ends_with("age", "0"))).unwrap_err();
    assert!(matches!(err, QueryError::InvalidLiteral { ref field, .. } if field == "age"));
}

#[test]
fn in_list() {
    let q = build(&QueryRequest::new().filter(FilterExpr::in_list("city", ["Oslo", "Bergen"])))
        .unwrap();
    assert_eq!(
        q.criteria.conditions,
        vec![cond(
            "address1_city",
            ConditionOperator::In,
            vec!["Oslo".into(), "Bergen".into()]
        )]
    );

    let empty: [&str; 0] = [];
    assert!(matches!(
        build(&QueryRequest::new().filter(FilterExpr::in_list("city", empty))),
        Err(QueryError::EmptyInList { .. })
    ));
    assert!(matches!(
        build(&QueryRequest::new().filter(FilterExpr::in_list(
            "city",
            [Value::from("Oslo"), Value::Null]
        ))),
        Err(QueryError::NullInList { .. })
    ));
}

#[test]
fn nested_groups_keep_their_shape() {
    // name eq 'A' and (age gt 30 or city eq 'Oslo')
    let filter = FilterExpr::and(vec![
        FilterExpr::eq("name", "A"),
        FilterExpr::or(vec![
            FilterExpr::gt("age", 30_i64),
            FilterExpr::eq("city", "Oslo"),
        ]),
    ]);
    let q = build(&QueryRequest::new().filter(filter)).unwrap();

    assert_eq!(q.criteria.filter_operator, LogicalOperator::And);
    assert_eq!(q.criteria.conditions.len(), 1);
    assert_eq!(q.criteria.filters.len(), 1);
    let inner = &q.criteria.filters[0];
    assert_eq!(inner.filter_operator, LogicalOperator::Or);
    assert_eq!(
        inner.conditions,
        vec![
            cond("new_age", ConditionOperator::GreaterThan, vec![Value::Int(30)]),
            cond("address1_city", ConditionOperator::Equal, vec!["Oslo".into()]),
        ]
    );
    assert_eq!(q.criteria.depth(), 2);
}

#[test]
fn same_operator_groups_are_not_flattened() {
    let filter = FilterExpr::and(vec![
        FilterExpr::and(vec![FilterExpr::eq("name", "A"), FilterExpr::eq("city", "B")]),
        FilterExpr::eq("age", 3_i64),
    ]);
    let q = build(&QueryRequest::new().filter(filter)).unwrap();
    assert_eq!(q.criteria.filters.len(), 1);
    assert_eq!(q.criteria.filters[0].conditions.len(), 2);
    assert_eq!(q.criteria.conditions.len(), 1);
}

#[test]
fn not_on_a_leaf_negates_the_operator() {
    let q = build(&QueryRequest::new().filter(FilterExpr::not(FilterExpr::lt("age", 5_i64))))
        .unwrap();
    assert_eq!(
        q.criteria.conditions,
        vec![cond("new_age", ConditionOperator::GreaterEqual, vec![Value::Int(5)])]
    );

    let q = build(&QueryRequest::new().filter(FilterExpr::not(FilterExpr::contains("name", "x"))))
        .unwrap();
    assert_eq!(q.criteria.conditions[0].operator, ConditionOperator::NotLike);

    let q = build(&QueryRequest::new().filter(FilterExpr::not(FilterExpr::is_null("email"))))
        .unwrap();
    assert_eq!(q.criteria.conditions[0].operator, ConditionOperator::NotNull);
}

#[test]
fn not_on_a_group_applies_de_morgan() {
    let filter = FilterExpr::not(FilterExpr::and(vec![
        FilterExpr::eq("name", "A"),
        FilterExpr::or(vec![
            FilterExpr::in_list("city", ["X"]),
            FilterExpr::starts_with("name", "B"),
        ]),
    ]));
    let q = build(&QueryRequest::new().filter(filter)).unwrap();

    assert_eq!(q.criteria.filter_operator, LogicalOperator::Or);
    assert_eq!(
        q.criteria.conditions,
        vec![cond("fullname", ConditionOperator::NotEqual, vec!["A".into()])]
    );
    let inner = &q.criteria.filters[0];
    assert_eq!(inner.filter_operator, LogicalOperator::And);
    assert_eq!(inner.conditions[0].operator, ConditionOperator::NotIn);
    assert_eq!(inner.conditions[1].operator, ConditionOperator::DoesNotBeginWith);
}

#[test]
fn double_negation_cancels() {
    let q = build(&QueryRequest::new().filter(FilterExpr::not(FilterExpr::not(
        FilterExpr::eq("name", "A"),
    ))))
    .unwrap();
    assert_eq!(q.criteria.conditions[0].operator, ConditionOperator::Equal);
}

#[test]
fn empty_group_is_rejected() {
    let err = build(&QueryRequest::new().filter(FilterExpr::or(vec![]))).unwrap_err();
    assert_eq!(
        err,
        QueryError::EmptyGroup {
            operator: LogicalOperator::Or
        }
    );
}

#[test]
fn unmapped_fields_name_clause_and_field() {
    let err = build(&QueryRequest::new().filter(FilterExpr::eq("nickname", "x"))).unwrap_err();
    assert_eq!(
        err,
        QueryError::UnmappedField {
            clause: QueryClause::Filter,
            field: "nickname".to_owned()
        }
    );
    assert_eq!(err.to_string(), "filter: field 'nickname' is not mapped");

    let err = build(&QueryRequest::new().order_by(OrderKey::asc("nickname"))).unwrap_err();
    assert!(matches!(
        err,
        QueryError::UnmappedField {
            clause: QueryClause::OrderBy,
            ..
        }
    ));

    let err = build(&QueryRequest::new().select(["name", "nickname"])).unwrap_err();
    assert!(matches!(
        err,
        QueryError::UnmappedField {
            clause: QueryClause::Select,
            ..
        }
    ));
}

#[test]
fn literal_conversion_errors_name_the_field() {
    let err = build(&QueryRequest::new().filter(FilterExpr::eq("age", "old"))).unwrap_err();
    assert!(matches!(err, QueryError::InvalidLiteral { ref field, .. } if field == "age"));
}

#[test]
fn projection_is_resolved_and_deduplicated_in_order() {
    let q = build(&QueryRequest::new().select(["city", "name", "city", "id"])).unwrap();
    assert_eq!(
        q.column_set,
        ColumnSet::Columns(vec![
            "address1_city".to_owned(),
            "fullname".to_owned(),
            "contactid".to_owned(),
        ])
    );

    let none: [&str; 0] = [];
    assert_eq!(
        build(&QueryRequest::new().select(none)).unwrap_err(),
        QueryError::EmptySelect
    );
}

#[test]
fn sort_keys_keep_order_and_direction() {
    let q = build(
        &QueryRequest::new()
            .order_by(OrderKey::desc("age"))
            .order_by(OrderKey::asc("name")),
    )
    .unwrap();
    assert_eq!(
        q.orders,
        vec![
            OrderExpression {
                attribute_name: "new_age".to_owned(),
                order_type: OrderType::Descending,
            },
            OrderExpression {
                attribute_name: "fullname".to_owned(),
                order_type: OrderType::Ascending,
            },
        ]
    );
}

#[test]
fn aligned_paging() {
    let q = build(&QueryRequest::new().skip(20).top(10)).unwrap();
    assert_eq!(
        q.paging,
        Some(PagingInfo {
            count: 10,
            page_number: 3
        })
    );
    assert_eq!(q.paging.unwrap().offset(), 20);
}

#[test]
fn misaligned_paging() {
    let err = build(&QueryRequest::new().skip(25).top(10)).unwrap_err();
    assert!(err.is_misaligned_paging());
    let err = build(&QueryRequest::new().skip(25)).unwrap_err();
    assert!(err.is_misaligned_paging());
}

#[test]
fn zero_top_yields_nothing() {
    let q = build(&QueryRequest::new().top(0)).unwrap();
    assert!(q.yields_nothing());
}

#[test]
fn negative_top_fails_before_filter_translation() {
    let request = QueryRequest::new()
        .filter(FilterExpr::eq("nickname", "x"))
        .top(-1);
    assert!(matches!(
        build(&request),
        Err(QueryError::Negative {
            clause: QueryClause::Top,
            ..
        })
    ));
}

#[test]
fn page_size_limit_comes_from_configuration() {
    let builder = QueryExpressionBuilder::new(50);
    assert_eq!(builder.max_page_size(), 50);
    let err = builder
        .build("contact", &QueryRequest::new().top(51), &Fields)
        .unwrap_err();
    assert!(err.to_string().starts_with("top:"));
}
