use serde::Serialize;
use std::fmt;

use crate::Entry;

/// Error codes a config validator entry may carry (§4.1, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorCode {
    InvalidApiName,
    DuplicateApiName,
    InvalidReference,
    InvalidRelation,
    InvalidSync,
    InvalidCache,
}

impl ConfigErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigErrorCode::InvalidApiName => "INVALID_API_NAME",
            ConfigErrorCode::DuplicateApiName => "DUPLICATE_API_NAME",
            ConfigErrorCode::InvalidReference => "INVALID_REFERENCE",
            ConfigErrorCode::InvalidRelation => "INVALID_RELATION",
            ConfigErrorCode::InvalidSync => "INVALID_SYNC",
            ConfigErrorCode::InvalidCache => "INVALID_CACHE",
        }
    }
}

impl fmt::Display for ConfigErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batch error produced by the config validator (C3). Never raised on the
/// first issue found — the whole catalogue is walked and every entry
/// collected before this is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("CONFIG_INVALID: {} issue(s) found", entries.len())]
pub struct ConfigError {
    pub entries: Vec<Entry>,
}

impl ConfigError {
    pub fn new(entries: Vec<Entry>) -> Self {
        assert!(!entries.is_empty(), "ConfigError must carry at least one entry");
        ConfigError { entries }
    }

    pub fn code(&self) -> &'static str {
        "CONFIG_INVALID"
    }
}

impl Serialize for ConfigError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ConfigError", 3)?;
        s.serialize_field("code", self.code())?;
        s.serialize_field("message", &self.to_string())?;
        s.serialize_field("errors", &self.entries)?;
        s.end()
    }
}
