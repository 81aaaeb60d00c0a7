use qg_query::{FilterEntry, QueryDefinition};
use serde_json::json;

#[test]
fn parses_value_filter() {
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "filters": [{ "column": "status", "operator": "eq", "value": "open" }]
    }))
    .unwrap();
    assert!(matches!(def.filters.unwrap()[0], FilterEntry::Value(_)));
}

#[test]
fn parses_column_compare_filter() {
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "filters": [{ "column": "updatedAt", "operator": "gte", "refColumn": "createdAt" }]
    }))
    .unwrap();
    assert!(matches!(def.filters.unwrap()[0], FilterEntry::ColumnCompare(_)));
}

#[test]
fn parses_filter_group() {
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "filters": [{
            "logic": "or",
            "conditions": [
                { "column": "status", "operator": "eq", "value": "open" },
                { "column": "status", "operator": "eq", "value": "pending" }
            ]
        }]
    }))
    .unwrap();
    assert!(matches!(def.filters.unwrap()[0], FilterEntry::Group(_)));
}

#[test]
fn parses_exists_filter() {
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "filters": [{
            "table": "orderItems",
            "exists": true,
            "filters": [{ "column": "quantity", "operator": "gt", "value": 1 }]
        }]
    }))
    .unwrap();
    assert!(matches!(def.filters.unwrap()[0], FilterEntry::Exists(_)));
}

#[test]
fn rejects_unknown_fields() {
    let result: Result<QueryDefinition, _> = serde_json::from_value(json!({
        "from": "orders",
        "bogusField": true
    }));
    assert!(result.is_err());
}
