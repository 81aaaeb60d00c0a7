use async_trait::async_trait;
use qg_errors::{ProviderError, ProviderErrorCode};
use qg_metadata::{MetadataConfig, Role};
use qg_registry::{MetadataProvider, RoleProvider};

/// Loads the catalogue from a JSON file on disk (§6 `MetadataProvider`).
/// A database- or config-service-backed provider would live alongside
/// this one; a file is the simplest thing that satisfies the contract.
pub struct FileMetadataProvider {
    pub path: String,
}

#[async_trait]
impl MetadataProvider for FileMetadataProvider {
    async fn load(&self) -> Result<MetadataConfig, ProviderError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            ProviderError::new(ProviderErrorCode::MetadataLoadFailed {
                cause: format!("reading {:?}: {e}", self.path),
            })
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ProviderError::new(ProviderErrorCode::MetadataLoadFailed {
                cause: format!("parsing {:?}: {e}", self.path),
            })
        })
    }
}

pub struct FileRoleProvider {
    pub path: String,
}

#[async_trait]
impl RoleProvider for FileRoleProvider {
    async fn load(&self) -> Result<Vec<Role>, ProviderError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            ProviderError::new(ProviderErrorCode::RoleLoadFailed {
                cause: format!("reading {:?}: {e}", self.path),
            })
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ProviderError::new(ProviderErrorCode::RoleLoadFailed {
                cause: format!("parsing {:?}: {e}", self.path),
            })
        })
    }
}
