use serde::Serialize;
use serde_json::json;

/// Single-shot planner error (C7, §4.4, §7). The planner never returns
/// both a plan and an error, and never neither (P7).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlannerErrorCode {
    #[error("no reachable plan covers tables {tables:?}")]
    UnreachableTables { tables: Vec<String> },
    #[error("query spans multiple databases but federation is disabled")]
    TrinoDisabled,
    #[error("federation is enabled but databases {missing:?} declare no catalog")]
    NoCatalog { missing: Vec<String> },
    #[error("required freshness {required_freshness} cannot be met (best available lag: {available_lag})")]
    FreshnessUnmet {
        required_freshness: String,
        available_lag: String,
    },
}

impl PlannerErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlannerErrorCode::UnreachableTables { .. } => "UNREACHABLE_TABLES",
            PlannerErrorCode::TrinoDisabled => "TRINO_DISABLED",
            PlannerErrorCode::NoCatalog { .. } => "NO_CATALOG",
            PlannerErrorCode::FreshnessUnmet { .. } => "FRESHNESS_UNMET",
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            PlannerErrorCode::UnreachableTables { tables } => json!({
                "code": self.as_str(),
                "tables": tables,
            }),
            PlannerErrorCode::TrinoDisabled => json!({ "code": self.as_str() }),
            PlannerErrorCode::NoCatalog { missing } => json!({
                "code": self.as_str(),
                "missing": missing,
            }),
            PlannerErrorCode::FreshnessUnmet {
                required_freshness,
                available_lag,
            } => json!({
                "code": self.as_str(),
                "requiredFreshness": required_freshness,
                "availableLag": available_lag,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}")]
pub struct PlannerError {
    pub code: PlannerErrorCode,
    pub from_table: Option<String>,
}

impl PlannerError {
    pub fn new(code: PlannerErrorCode, from_table: impl Into<Option<String>>) -> Self {
        PlannerError {
            code,
            from_table: from_table.into(),
        }
    }
}

impl Serialize for PlannerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("PlannerError", 4)?;
        s.serialize_field("code", self.code.as_str())?;
        s.serialize_field("message", &self.code.to_string())?;
        s.serialize_field("fromTable", &self.from_table)?;
        s.serialize_field("details", &self.code.details())?;
        s.end()
    }
}
