use qg_metadata::ColumnType;
use serde::Serialize;
use serde_json::Value;

/// Which routing decision (C7) produced the result actually served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Direct,
    Materialized,
    Cache,
    Trino,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub api_name: String,
    pub masked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_type: Option<ColumnType>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTiming {
    pub phase: String,
    pub millis: u64,
}

/// Carried alongside every [`QueryResult`] (§4.7): what was decided and
/// how long each stage took, surfaced only when the caller asked for
/// debug output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMeta {
    pub strategy: Strategy,
    pub database: String,
    pub dialect: String,
    pub tables: Vec<String>,
    pub columns: Vec<ColumnDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_timings: Option<Vec<PhaseTiming>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_log: Option<Vec<String>>,
}

/// The pipeline's typed outcome (§4.7): the client-facing `kind` discriminant
/// plus whatever payload that kind carries.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum QueryResult {
    Sql {
        sql: String,
        params: Vec<Value>,
        meta: QueryMeta,
    },
    Count {
        count: i64,
        meta: QueryMeta,
    },
    Data {
        data: Vec<Value>,
        meta: QueryMeta,
    },
}
