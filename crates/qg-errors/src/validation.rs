use serde::Serialize;
use std::fmt;

use crate::Entry;

/// Error codes a query validator entry may carry (§4.3, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    UnknownTable,
    UnknownColumn,
    UnknownRole,
    AccessDenied,
    InvalidFilter,
    InvalidValue,
    InvalidJoin,
    InvalidGroupBy,
    InvalidHaving,
    InvalidOrderBy,
    InvalidByIds,
    InvalidLimit,
    InvalidExists,
    InvalidAggregation,
}

impl ValidationErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationErrorCode::UnknownTable => "UNKNOWN_TABLE",
            ValidationErrorCode::UnknownColumn => "UNKNOWN_COLUMN",
            ValidationErrorCode::UnknownRole => "UNKNOWN_ROLE",
            ValidationErrorCode::AccessDenied => "ACCESS_DENIED",
            ValidationErrorCode::InvalidFilter => "INVALID_FILTER",
            ValidationErrorCode::InvalidValue => "INVALID_VALUE",
            ValidationErrorCode::InvalidJoin => "INVALID_JOIN",
            ValidationErrorCode::InvalidGroupBy => "INVALID_GROUP_BY",
            ValidationErrorCode::InvalidHaving => "INVALID_HAVING",
            ValidationErrorCode::InvalidOrderBy => "INVALID_ORDER_BY",
            ValidationErrorCode::InvalidByIds => "INVALID_BY_IDS",
            ValidationErrorCode::InvalidLimit => "INVALID_LIMIT",
            ValidationErrorCode::InvalidExists => "INVALID_EXISTS",
            ValidationErrorCode::InvalidAggregation => "INVALID_AGGREGATION",
        }
    }
}

impl fmt::Display for ValidationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batch error produced by the query validator (C6). Carries the `from`
/// table of the offending query so a client can correlate it without
/// re-parsing the request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("VALIDATION_FAILED: {} issue(s) found for table {from_table:?}", entries.len())]
pub struct ValidationError {
    pub from_table: Option<String>,
    pub entries: Vec<Entry>,
}

impl ValidationError {
    pub fn new(from_table: Option<String>, entries: Vec<Entry>) -> Self {
        assert!(
            !entries.is_empty(),
            "ValidationError must carry at least one entry"
        );
        ValidationError { from_table, entries }
    }

    pub fn code(&self) -> &'static str {
        "VALIDATION_FAILED"
    }
}

impl Serialize for ValidationError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ValidationError", 4)?;
        s.serialize_field("code", self.code())?;
        s.serialize_field("message", &self.to_string())?;
        s.serialize_field("fromTable", &self.from_table)?;
        s.serialize_field("errors", &self.entries)?;
        s.end()
    }
}
