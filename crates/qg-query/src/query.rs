use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::FilterEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    Left,
}

impl Default for JoinType {
    fn default() -> Self {
        JoinType::Inner
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Join {
    pub table: String,
    #[serde(default)]
    pub r#type: JoinType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<FilterEntry>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// Aggregation target: either a named column or the literal `"*"`
/// (§3 `{column|*, fn, alias, table?}`), used for `count(*)`. Both forms
/// are plain JSON strings, so this is a thin wrapper rather than a sum
/// type — an untagged enum over two string variants can never pick the
/// second arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AggregationTarget(pub String);

impl AggregationTarget {
    pub fn is_wildcard(&self) -> bool {
        self.0 == "*"
    }

    pub fn column_name(&self) -> Option<&str> {
        if self.is_wildcard() {
            None
        } else {
            Some(self.0.as_str())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Aggregation {
    pub column: AggregationTarget,
    pub r#fn: AggregationFn,
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl Default for OrderDirection {
    fn default() -> Self {
        OrderDirection::Asc
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub direction: OrderDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct GroupBy {
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

pub use qg_metadata::Freshness;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ExecuteMode {
    Data,
    Count,
    SqlOnly,
}

impl Default for ExecuteMode {
    fn default() -> Self {
        ExecuteMode::Data
    }
}

/// The client-facing query definition (§3). Parsed once at the API
/// boundary; every stage downstream consumes this typed shape, never raw
/// JSON. Unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct QueryDefinition {
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joins: Option<Vec<Join>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<FilterEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<GroupBy>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Vec<Aggregation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub having: Option<Vec<FilterEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<OrderBy>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_ids: Option<Vec<Value>>,
    #[serde(default)]
    pub freshness: Freshness,
    #[serde(default)]
    pub execute_mode: ExecuteMode,
    #[serde(default)]
    pub debug: bool,
}
