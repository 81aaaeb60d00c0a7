use qg_dialect::{generate, Dialect};
use qg_metadata::{Column, ColumnType, Database, Engine, ExecutionContext, MetadataConfig, ScalarType, Table};
use qg_query::QueryDefinition;
use qg_registry::Snapshot;
use qg_resolve::resolve;
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
                Column {
                    api_name: "name".into(),
                    physical_name: "customer_name".into(),
                    r#type: ColumnType::scalar(ScalarType::String),
                    nullable: true,
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
fn postgres_simple_eq_filter_uses_dollar_placeholder() {
    let snapshot = snapshot();
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "filters": [{ "column": "status", "operator": "eq", "value": "open" }]
    }))
    .unwrap();
    let parts = resolve(&def, &snapshot, &ExecutionContext::default());
    let generated = generate(Dialect::Postgres, &parts);
    assert!(generated.sql.contains("WHERE \"t0\".\"status\" = $1"));
    assert_eq!(generated.params, vec![json!("open")]);
}

#[test]
fn postgres_starts_with_wraps_and_escapes_pattern() {
    let snapshot = snapshot();
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "filters": [{ "column": "name", "operator": "startsWith", "value": "50%_off" }]
    }))
    .unwrap();
    let parts = resolve(&def, &snapshot, &ExecutionContext::default());
    let generated = generate(Dialect::Postgres, &parts);
    assert!(generated.sql.contains("LIKE $1"));
    assert_eq!(generated.params, vec![json!("50\\%\\_off%")]);
}

#[test]
fn clickhouse_uses_typed_named_placeholder_and_bare_identifiers() {
    let snapshot = snapshot();
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "filters": [{ "column": "status", "operator": "eq", "value": "open" }]
    }))
    .unwrap();
    let parts = resolve(&def, &snapshot, &ExecutionContext::default());
    let generated = generate(Dialect::Clickhouse, &parts);
    assert!(generated.sql.contains("{p0:String}"));
    assert!(generated.sql.contains("AS `status`"));
    assert!(!generated.sql.contains("__status"));
}

#[test]
fn federated_expands_in_list_into_one_placeholder_per_element() {
    let snapshot = snapshot();
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "filters": [{ "column": "status", "operator": "in", "value": ["open", "closed", "pending"] }]
    }))
    .unwrap();
    let parts = resolve(&def, &snapshot, &ExecutionContext::default());
    let generated = generate(Dialect::Federated, &parts);
    assert!(generated.sql.contains("IN (?, ?, ?)"));
    assert_eq!(generated.params, vec![json!("open"), json!("closed"), json!("pending")]);
}

#[test]
fn federated_ilike_lowercases_both_sides() {
    let snapshot = snapshot();
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "filters": [{ "column": "status", "operator": "ilike", "value": "OPEN" }]
    }))
    .unwrap();
    let parts = resolve(&def, &snapshot, &ExecutionContext::default());
    let generated = generate(Dialect::Federated, &parts);
    assert!(generated.sql.contains("lower(\"t0\".\"status\") LIKE lower(?)"));
}

#[test]
fn count_mode_selects_count_star_across_all_dialects() {
    let snapshot = snapshot();
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "executeMode": "count"
    }))
    .unwrap();
    let parts = resolve(&def, &snapshot, &ExecutionContext::default());
    assert!(generate(Dialect::Postgres, &parts).sql.starts_with("SELECT COUNT(*)"));
    assert!(generate(Dialect::Clickhouse, &parts).sql.starts_with("SELECT count()"));
    assert!(generate(Dialect::Federated, &parts).sql.starts_with("SELECT COUNT(*)"));
}

/// Seeds a table whose `status` apiName maps to a differently-named
/// physical column, mirroring §8 scenario 2's `order_status`.
fn snapshot_with_renamed_status() -> std::sync::Arc<Snapshot> {
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
            columns: vec![Column {
                api_name: "status".into(),
                physical_name: "order_status".into(),
                r#type: ColumnType::scalar(ScalarType::String),
                nullable: false,
                masking_fn: None,
            }],
            primary_key: vec!["status".into()],
            relations: vec![],
        }],
        caches: vec![],
        syncs: vec![],
    };
    Snapshot::build(config, vec![])
}

#[test]
fn group_by_having_and_order_by_match_scenario_2() {
    let snapshot = snapshot_with_renamed_status();
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "columns": ["status"],
        "groupBy": [{ "column": "status" }],
        "aggregations": [{ "column": "*", "fn": "count", "alias": "cnt" }],
        "having": [{ "column": "cnt", "operator": "gt", "value": 5 }],
        "orderBy": [{ "column": "cnt", "direction": "desc" }],
        "limit": 10
    }))
    .unwrap();
    let parts = resolve(&def, &snapshot, &ExecutionContext::default());
    let generated = generate(Dialect::Postgres, &parts);
    assert!(generated.sql.contains("COUNT(*) AS \"cnt\""));
    assert!(generated.sql.contains("GROUP BY \"t0\".\"order_status\""));
    assert!(generated.sql.contains("HAVING COUNT(*) > $1"));
    assert!(generated.sql.contains("ORDER BY \"cnt\" DESC"));
    assert!(generated.sql.contains("LIMIT 10"));
    assert_eq!(generated.params, vec![json!(5)]);
}

#[test]
fn order_by_on_plain_column_resolves_to_physical_name() {
    let snapshot = snapshot();
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "columns": ["name"],
        "orderBy": [{ "column": "name" }]
    }))
    .unwrap();
    let parts = resolve(&def, &snapshot, &ExecutionContext::default());
    let generated = generate(Dialect::Postgres, &parts);
    assert!(generated.sql.contains("ORDER BY \"t0\".\"customer_name\" ASC"));
}
