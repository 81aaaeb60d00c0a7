use serde::Serialize;
use serde_json::json;

/// Single-shot provider error (§6, §7), raised by `MetadataProvider::load`
/// and `RoleProvider::load`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderErrorCode {
    #[error("failed to load metadata: {cause}")]
    MetadataLoadFailed { cause: String },
    #[error("failed to load roles: {cause}")]
    RoleLoadFailed { cause: String },
}

impl ProviderErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorCode::MetadataLoadFailed { .. } => "METADATA_LOAD_FAILED",
            ProviderErrorCode::RoleLoadFailed { .. } => "ROLE_LOAD_FAILED",
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            ProviderErrorCode::MetadataLoadFailed { cause } => json!({ "cause": cause }),
            ProviderErrorCode::RoleLoadFailed { cause } => json!({ "cause": cause }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}")]
pub struct ProviderError {
    pub code: ProviderErrorCode,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode) -> Self {
        ProviderError { code }
    }
}

impl Serialize for ProviderError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ProviderError", 3)?;
        s.serialize_field("code", self.code.as_str())?;
        s.serialize_field("message", &self.code.to_string())?;
        s.serialize_field("details", &self.code.details())?;
        s.end()
    }
}
