mod clickhouse;
mod escape;
mod postgres;
mod trino;

pub use qg_planner::Dialect;
use qg_resolve::SqlParts;
use serde_json::Value;

/// A rendered query ready to hand to an executor: the SQL text and its
/// parameter vector, ordered to match the dialect's placeholder binding
/// convention (§4.6, §6).
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSql {
    pub sql: String,
    pub params: Vec<Value>,
}

pub fn generate(dialect: Dialect, parts: &SqlParts) -> GeneratedSql {
    match dialect {
        Dialect::Postgres => postgres::generate(parts),
        Dialect::Clickhouse => clickhouse::generate(parts),
        Dialect::Federated => trino::generate(parts),
    }
}
