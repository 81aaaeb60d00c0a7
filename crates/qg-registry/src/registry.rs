use std::sync::{Arc, RwLock};

use qg_errors::{ConfigError, ProviderError};
use qg_metadata::validate_config;
use tracing::{info, warn};

use crate::provider::{MetadataProvider, RoleProvider};
use crate::snapshot::Snapshot;

/// Errors a registry reload may fail with: either provider carries an
/// I/O-ish `ProviderError`, or the freshly-loaded catalogue itself fails
/// structural validation.
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Holds the single active [`Snapshot`] reference. Reads never block on a
/// reload in progress: the lock only ever guards a pointer swap.
pub struct Registry {
    metadata_provider: Arc<dyn MetadataProvider>,
    role_provider: Arc<dyn RoleProvider>,
    current: RwLock<Arc<Snapshot>>,
}

impl Registry {
    /// Performs an initial load; the registry cannot exist without a
    /// valid first snapshot.
    pub async fn bootstrap(
        metadata_provider: Arc<dyn MetadataProvider>,
        role_provider: Arc<dyn RoleProvider>,
    ) -> Result<Registry, ReloadError> {
        let snapshot = Self::load_snapshot(&*metadata_provider, &*role_provider).await?;
        Ok(Registry {
            metadata_provider,
            role_provider,
            current: RwLock::new(snapshot),
        })
    }

    /// The snapshot in effect right now. Callers should capture this once
    /// per query and use that reference throughout, not re-fetch mid-query.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.read().expect("registry lock poisoned").clone()
    }

    /// Loads a new snapshot and swaps it in atomically. On any failure the
    /// previous snapshot remains in effect and the error is returned.
    pub async fn reload(&self) -> Result<(), ReloadError> {
        match Self::load_snapshot(&*self.metadata_provider, &*self.role_provider).await {
            Ok(snapshot) => {
                *self.current.write().expect("registry lock poisoned") = snapshot;
                info!("metadata registry reloaded");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "metadata registry reload failed, keeping previous snapshot");
                Err(err)
            }
        }
    }

    async fn load_snapshot(
        metadata_provider: &dyn MetadataProvider,
        role_provider: &dyn RoleProvider,
    ) -> Result<Arc<Snapshot>, ReloadError> {
        let config = metadata_provider.load().await?;
        let roles = role_provider.load().await?;
        validate_config(&config)?;
        Ok(Snapshot::build(config, roles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qg_metadata::{Database, Engine};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyMetadataProvider {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MetadataProvider for FlakyMetadataProvider {
        async fn load(&self) -> Result<qg_metadata::MetadataConfig, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Ok(qg_metadata::MetadataConfig {
                    databases: vec![Database {
                        id: "db1".into(),
                        engine: Engine::Postgres,
                        federation_catalog: None,
                    }],
                    tables: vec![],
                    caches: vec![],
                    syncs: vec![],
                })
            } else {
                Err(ProviderError::new(qg_errors::ProviderErrorCode::MetadataLoadFailed {
                    cause: "boom".into(),
                }))
            }
        }
    }

    struct EmptyRoleProvider;

    #[async_trait::async_trait]
    impl RoleProvider for EmptyRoleProvider {
        async fn load(&self) -> Result<Vec<qg_metadata::Role>, ProviderError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn failed_reload_preserves_previous_snapshot() {
        let provider = Arc::new(FlakyMetadataProvider {
            calls: AtomicUsize::new(0),
        });
        let registry = Registry::bootstrap(provider, Arc::new(EmptyRoleProvider))
            .await
            .unwrap();
        let before = registry.current();
        assert!(registry.reload().await.is_err());
        let after = registry.current();
        assert!(Arc::ptr_eq(&before, &after));
    }
}
