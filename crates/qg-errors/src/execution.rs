use serde::Serialize;
use serde_json::json;

/// Single-shot execution error (C11, §6, §7). `QUERY_FAILED` and
/// `QUERY_TIMEOUT` carry the generated SQL and its parameter vector so a
/// client can reproduce the failure — but never an unparameterized value
/// (the parameters are already isolated into their own array).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionErrorCode {
    #[error("no executor configured for database {database}")]
    ExecutorMissing { database: String },
    #[error("no cache provider configured for cache {cache_id}")]
    CacheProviderMissing { cache_id: String },
    #[error("query failed against {database} ({dialect}): {cause}")]
    QueryFailed {
        database: String,
        dialect: String,
        sql: String,
        params: Vec<serde_json::Value>,
        cause: String,
    },
    #[error("query against {database} ({dialect}) timed out after {timeout_ms}ms")]
    QueryTimeout {
        database: String,
        dialect: String,
        sql: String,
        timeout_ms: u64,
    },
}

impl ExecutionErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionErrorCode::ExecutorMissing { .. } => "EXECUTOR_MISSING",
            ExecutionErrorCode::CacheProviderMissing { .. } => "CACHE_PROVIDER_MISSING",
            ExecutionErrorCode::QueryFailed { .. } => "QUERY_FAILED",
            ExecutionErrorCode::QueryTimeout { .. } => "QUERY_TIMEOUT",
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            ExecutionErrorCode::ExecutorMissing { database } => json!({
                "code": self.as_str(),
                "database": database,
            }),
            ExecutionErrorCode::CacheProviderMissing { cache_id } => json!({
                "code": self.as_str(),
                "cacheId": cache_id,
            }),
            ExecutionErrorCode::QueryFailed {
                database,
                dialect,
                sql,
                params,
                cause,
            } => json!({
                "code": self.as_str(),
                "database": database,
                "dialect": dialect,
                "sql": sql,
                "params": params,
                "cause": cause,
            }),
            ExecutionErrorCode::QueryTimeout {
                database,
                dialect,
                sql,
                timeout_ms,
            } => json!({
                "code": self.as_str(),
                "database": database,
                "dialect": dialect,
                "sql": sql,
                "timeoutMs": timeout_ms,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}")]
pub struct ExecutionError {
    pub code: ExecutionErrorCode,
}

impl ExecutionError {
    pub fn new(code: ExecutionErrorCode) -> Self {
        ExecutionError { code }
    }
}

impl Serialize for ExecutionError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ExecutionError", 3)?;
        s.serialize_field("code", self.code.as_str())?;
        s.serialize_field("message", &self.code.to_string())?;
        s.serialize_field("details", &self.code.details())?;
        s.end()
    }
}
