use async_trait::async_trait;
use qg_errors::{ConnectionError, ExecutionError};
use serde_json::Value;

/// §6 `Executor` contract: runs dialect-rendered SQL against one physical
/// database and returns rows as plain JSON objects. Implementations live
/// outside this crate (a Postgres pool, a ClickHouse client, a Trino
/// client); this is the narrow interface the pipeline depends on.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, ExecutionError>;

    async fn ping(&self) -> Result<(), ConnectionError>;

    async fn close(&self) -> Result<(), ConnectionError>;
}
