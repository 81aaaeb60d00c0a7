use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use qg_errors::{ErrorClass, ProviderError};
use qg_metadata::{
    AllowedColumns, Cache, CacheEntry, Column, ColumnType, Database, Engine, ExecutionContext,
    ExecutionContextRoles, MaskingFn, MetadataConfig, Role, RoleTableEntry, RoleTables,
    ScalarType, Table,
};
use qg_pipeline::testing::{FailingExecutor, FixedExecutor, InMemoryCache};
use qg_pipeline::{Executor, Pipeline, PipelineError, QueryResult, Strategy};
use qg_query::QueryDefinition;
use qg_registry::{MetadataProvider, Registry, RoleProvider};
use serde_json::json;

struct FixedMetadataProvider(MetadataConfig);

#[async_trait]
impl MetadataProvider for FixedMetadataProvider {
    async fn load(&self) -> Result<MetadataConfig, ProviderError> {
        Ok(self.0.clone())
    }
}

struct FixedRoleProvider(Vec<Role>);

#[async_trait]
impl RoleProvider for FixedRoleProvider {
    async fn load(&self) -> Result<Vec<Role>, ProviderError> {
        Ok(self.0.clone())
    }
}

fn customers_table() -> Table {
    Table {
        id: "t1".into(),
        api_name: "customers".into(),
        database: "db1".into(),
        physical_name: "public.customers".into(),
        columns: vec![
            Column {
                api_name: "id".into(),
                physical_name: "id".into(),
                r#type: ColumnType::scalar(ScalarType::Uuid),
                nullable: false,
                masking_fn: None,
            },
            Column {
                api_name: "email".into(),
                physical_name: "email".into(),
                r#type: ColumnType::scalar(ScalarType::String),
                nullable: false,
                masking_fn: Some(MaskingFn::Email),
            },
            Column {
                api_name: "name".into(),
                physical_name: "name".into(),
                r#type: ColumnType::scalar(ScalarType::String),
                nullable: false,
                masking_fn: None,
            },
        ],
        primary_key: vec!["id".into()],
        relations: vec![],
    }
}

fn config() -> MetadataConfig {
    MetadataConfig {
        databases: vec![Database {
            id: "db1".into(),
            engine: Engine::Postgres,
            federation_catalog: None,
        }],
        tables: vec![customers_table()],
        caches: vec![Cache {
            id: "c1".into(),
            engine: "redis".into(),
            entries: vec![CacheEntry {
                table_id: "t1".into(),
                key_pattern: "customer:{id}".into(),
                columns: None,
            }],
        }],
        syncs: vec![],
    }
}

fn masking_context() -> ExecutionContext {
    ExecutionContext {
        roles: ExecutionContextRoles {
            user: Some(vec!["viewer".into()]),
            service: None,
        },
    }
}

fn viewer_role() -> Role {
    Role {
        id: "viewer".into(),
        tables: RoleTables::List(vec![RoleTableEntry {
            table_id: "t1".into(),
            allowed_columns: AllowedColumns::All("*".into()),
            masked_columns: Some(vec!["email".into()]),
        }]),
    }
}

async fn registry(roles: Vec<Role>) -> Arc<Registry> {
    let registry = Registry::bootstrap(
        Arc::new(FixedMetadataProvider(config())),
        Arc::new(FixedRoleProvider(roles)),
    )
    .await
    .expect("bootstrap with a valid catalogue never fails");
    Arc::new(registry)
}

fn executors(rows: Vec<serde_json::Value>) -> HashMap<String, Arc<dyn Executor>> {
    let mut map: HashMap<String, Arc<dyn Executor>> = HashMap::new();
    map.insert("db1".into(), Arc::new(FixedExecutor::new("db1", rows)));
    map
}

#[tokio::test]
async fn direct_query_masks_restricted_columns() {
    let registry = registry(vec![viewer_role()]).await;
    let executors = executors(vec![json!({
        "t0__id": "1",
        "t0__email": "alice@example.com",
        "t0__name": "Alice",
    })]);
    let pipeline = Pipeline::new(registry, executors, HashMap::new(), false);

    let def: QueryDefinition = serde_json::from_value(json!({ "from": "customers" })).unwrap();
    let result = pipeline.run(&def, &masking_context()).await.unwrap();

    match result {
        QueryResult::Data { data, meta } => {
            assert_eq!(meta.strategy, Strategy::Direct);
            assert_eq!(meta.database, "db1");
            assert_eq!(data.len(), 1);
            assert_eq!(data[0]["id"], json!("1"));
            assert_eq!(data[0]["name"], json!("Alice"));
            assert_ne!(data[0]["email"], json!("alice@example.com"));
        }
        other => panic!("expected Data, got {other:?}"),
    }
}

#[tokio::test]
async fn sql_only_mode_never_calls_the_executor() {
    let registry = registry(vec![]).await;
    let fixed = Arc::new(FixedExecutor::new("db1", vec![]));
    let mut executors: HashMap<String, Arc<dyn Executor>> = HashMap::new();
    executors.insert("db1".into(), fixed.clone());
    let pipeline = Pipeline::new(registry, executors, HashMap::new(), false);

    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "customers",
        "executeMode": "sql-only"
    }))
    .unwrap();
    let result = pipeline.run(&def, &ExecutionContext::default()).await.unwrap();

    match result {
        QueryResult::Sql { sql, .. } => assert!(sql.to_lowercase().contains("select")),
        other => panic!("expected Sql, got {other:?}"),
    }
    assert!(fixed.calls().is_empty());
}

#[tokio::test]
async fn count_mode_reads_the_count_column() {
    let registry = registry(vec![]).await;
    let executors = executors(vec![json!({ "count": 42 })]);
    let pipeline = Pipeline::new(registry, executors, HashMap::new(), false);

    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "customers",
        "executeMode": "count"
    }))
    .unwrap();
    let result = pipeline.run(&def, &ExecutionContext::default()).await.unwrap();

    match result {
        QueryResult::Count { count, .. } => assert_eq!(count, 42),
        other => panic!("expected Count, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_table_surfaces_as_a_validation_error() {
    let registry = registry(vec![]).await;
    let pipeline = Pipeline::new(registry, executors(vec![]), HashMap::new(), false);

    let def: QueryDefinition = serde_json::from_value(json!({ "from": "does_not_exist" })).unwrap();
    let err = pipeline.run(&def, &ExecutionContext::default()).await.unwrap_err();

    assert!(matches!(err, PipelineError::Validation(_)));
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn execution_failure_surfaces_with_its_own_status() {
    let registry = registry(vec![]).await;
    let mut executors: HashMap<String, Arc<dyn Executor>> = HashMap::new();
    executors.insert("db1".into(), Arc::new(FailingExecutor { database: "db1".into() }));
    let pipeline = Pipeline::new(registry, executors, HashMap::new(), false);

    let def: QueryDefinition = serde_json::from_value(json!({ "from": "customers" })).unwrap();
    let err = pipeline.run(&def, &ExecutionContext::default()).await.unwrap_err();

    assert!(matches!(err, PipelineError::Execution(_)));
    assert_eq!(err.http_status(), 500);
}

#[tokio::test]
async fn cache_strategy_combines_hits_with_a_fallback_fetch() {
    let registry = registry(vec![]).await;

    let mut cache_entries = HashMap::new();
    cache_entries.insert(
        "customer:1".to_string(),
        json!({ "id": "1", "email": "alice@example.com", "name": "Alice" }),
    );
    let mut caches: HashMap<String, Arc<dyn qg_pipeline::CacheProvider>> = HashMap::new();
    caches.insert("c1".into(), Arc::new(InMemoryCache::new(cache_entries)));

    let executors = executors(vec![json!({
        "t0__id": "2",
        "t0__email": "bob@example.com",
        "t0__name": "Bob",
    })]);

    let pipeline = Pipeline::new(registry, executors, caches, false);

    let def: QueryDefinition = serde_json::from_value(json!({
        "from": "customers",
        "byIds": ["1", "2"]
    }))
    .unwrap();
    let result = pipeline.run(&def, &ExecutionContext::default()).await.unwrap();

    match result {
        QueryResult::Data { data, meta } => {
            assert_eq!(meta.strategy, Strategy::Cache);
            assert_eq!(data.len(), 2);
            assert_eq!(data[0]["name"], json!("Alice"));
            assert_eq!(data[1]["name"], json!("Bob"));
        }
        other => panic!("expected Data, got {other:?}"),
    }
}

#[tokio::test]
async fn health_check_reports_every_target() {
    let registry = registry(vec![]).await;
    let mut executors: HashMap<String, Arc<dyn Executor>> = HashMap::new();
    executors.insert("db1".into(), Arc::new(FixedExecutor::new("db1", vec![])));
    executors.insert("down".into(), Arc::new(FailingExecutor { database: "down".into() }));
    let pipeline = Pipeline::new(registry, executors, HashMap::new(), false);

    let report = pipeline.health_check().await;
    assert!(!report.healthy);
    assert_eq!(report.executors.get("db1"), Some(&true));
    assert_eq!(report.executors.get("down"), Some(&false));
}
