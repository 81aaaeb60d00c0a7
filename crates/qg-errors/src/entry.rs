use serde::Serialize;

/// One issue found by a batch-accumulating validator (config checker or
/// query validator). `details` carries whatever fields are relevant to
/// `code` — entity, field, expected/actual, database, cacheId, and so on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl Entry {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Entry {
            code: code.into(),
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}
