use qg_metadata::{Column, ColumnType, Database, Engine, ExecutionContext, MetadataConfig, ScalarType, Table};
use qg_query::QueryDefinition;
use qg_registry::Snapshot;
use qg_resolve::{resolve, WhereNode};
use serde_json::json;

fn snapshot() -> std::sync::Arc<Snapshot> {
    let config = MetadataConfig {
        databases: vec![Database {
            id: "db1".into(),
            engine: Engine::Postgres,
            federation_catalog: None,
        }],
        tables: vec![Table {
            id: "t1".into(),
            api_name: "orders".into(),
            database: "db1".into(),
            physical_name: "public.orders".into(),
            columns: vec![
                Column {
                    api_name: "id".into(),
                    physical_name: "id".into(),
                    r#type: ColumnType::scalar(ScalarType::Uuid),
                    nullable: false,
                    masking_fn: None,
                },
                Column {
                    api_name: "status".into(),
                    physical_name: "status".into(),
                    r#type: ColumnType::scalar(ScalarType::String),
                    nullable: false,
                    masking_fn: None,
                },
            ],
            primary_key: vec!["id".into()],
            relations: vec![],
        }],
        caches: vec![],
        syncs: vec![],
    };
    Snapshot::build(config, vec![])
}

#[test]
fn selects_all_columns_when_omitted() {
    let snapshot = snapshot();
    let def: QueryDefinition = serde_json::from_value(json!({ "from": "orders" })).unwrap();
    let parts = resolve(&def, &snapshot, &ExecutionContext::default());
    assert_eq!(parts.column_mapping.len(), 2);
    assert_eq!(parts.from.alias, "t0");
}

#[test]
fn simple_filter_allocates_a_parameter() {
    let snapshot = snapshot();
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "filters": [{ "column": "status", "operator": "eq", "value": "open" }]
    }))
    .unwrap();
    let parts = resolve(&def, &snapshot, &ExecutionContext::default());
    assert_eq!(parts.params, vec![json!("open")]);
    assert!(matches!(parts.where_, Some(WhereNode::Simple { param_idx: Some(0), .. })));
}

#[test]
fn by_ids_compiles_to_in_filter_on_primary_key() {
    let snapshot = snapshot();
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "byIds": ["a", "b"]
    }))
    .unwrap();
    let parts = resolve(&def, &snapshot, &ExecutionContext::default());
    assert!(matches!(parts.where_, Some(WhereNode::Simple { .. })));
    assert_eq!(parts.params, vec![json!(["a", "b"])]);
}

#[test]
fn count_mode_suppresses_order_and_limit() {
    let snapshot = snapshot();
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "executeMode": "count",
        "limit": 10,
        "orderBy": [{ "column": "status" }]
    }))
    .unwrap();
    let parts = resolve(&def, &snapshot, &ExecutionContext::default());
    assert!(parts.count_mode);
    assert!(parts.limit.is_none());
    assert!(parts.order_by.is_empty());
}
