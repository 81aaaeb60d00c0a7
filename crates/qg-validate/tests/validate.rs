use qg_metadata::{
    AllowedColumns, Column, ColumnType, Database, Engine, ExecutionContext, ExecutionContextRoles,
    MetadataConfig, Role, RoleTableEntry, RoleTables, ScalarType, Table,
};
use qg_query::QueryDefinition;
use qg_registry::Snapshot;
use serde_json::json;

fn snapshot_with_orders() -> std::sync::Arc<Snapshot> {
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
fn rejects_unknown_from_table() {
    let snapshot = snapshot_with_orders();
    let def: QueryDefinition = serde_json::from_value(json!({ "from": "bogus" })).unwrap();
    let err = qg_validate::validate_query(&def, &snapshot, &ExecutionContext::default()).unwrap_err();
    assert_eq!(err.entries[0].code, "UNKNOWN_TABLE");
}

#[test]
fn rejects_unknown_column_in_filter() {
    let snapshot = snapshot_with_orders();
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "filters": [{ "column": "nope", "operator": "eq", "value": 1 }]
    }))
    .unwrap();
    let err = qg_validate::validate_query(&def, &snapshot, &ExecutionContext::default()).unwrap_err();
    assert!(err.entries.iter().any(|e| e.code == "UNKNOWN_COLUMN"));
}

#[test]
fn rejects_negative_limit() {
    let snapshot = snapshot_with_orders();
    let def: QueryDefinition = serde_json::from_value(json!({ "from": "orders", "limit": -1 })).unwrap();
    let err = qg_validate::validate_query(&def, &snapshot, &ExecutionContext::default()).unwrap_err();
    assert!(err.entries.iter().any(|e| e.code == "INVALID_LIMIT"));
}

#[test]
fn access_denied_when_role_excludes_column() {
    let snapshot_config = snapshot_with_orders();
    let role = Role {
        id: "r1".into(),
        tables: RoleTables::List(vec![RoleTableEntry {
            table_id: "t1".into(),
            allowed_columns: AllowedColumns::List(vec!["id".into()]),
            masked_columns: None,
        }]),
    };
    let snapshot = Snapshot::build((*snapshot_config).config.clone(), vec![role]);
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "columns": ["id", "status"]
    }))
    .unwrap();
    let ctx = ExecutionContext {
        roles: ExecutionContextRoles {
            user: Some(vec!["r1".into()]),
            service: None,
        },
    };
    let err = qg_validate::validate_query(&def, &snapshot, &ctx).unwrap_err();
    assert!(err.entries.iter().any(|e| e.code == "ACCESS_DENIED" && e.details["column"] == "status"));
}

#[test]
fn accepts_well_formed_query() {
    let snapshot = snapshot_with_orders();
    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "orders",
        "columns": ["id", "status"],
        "filters": [{ "column": "status", "operator": "eq", "value": "open" }],
        "limit": 10
    }))
    .unwrap();
    assert!(qg_validate::validate_query(&def, &snapshot, &ExecutionContext::default()).is_ok());
}
