use async_trait::async_trait;
use qg_errors::ProviderError;
use qg_metadata::{MetadataConfig, Role};

/// §6 `MetadataProvider` contract. Implementations live outside this
/// crate (file watchers, databases, remote config services); this is the
/// narrow interface the registry depends on.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn load(&self) -> Result<MetadataConfig, ProviderError>;
}

/// §6 `RoleProvider` contract.
#[async_trait]
pub trait RoleProvider: Send + Sync {
    async fn load(&self) -> Result<Vec<Role>, ProviderError>;
}
