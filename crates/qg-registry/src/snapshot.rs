use std::sync::Arc;

use qg_metadata::{Indexes, MetadataConfig, Role};

/// Immutable bundle of catalogue + roles + derived indexes (§3). Owned
/// exclusively by the registry at rest; queries hold their own `Arc` clone
/// captured at entry, so a reload never changes what an in-flight query
/// sees.
#[derive(Debug)]
pub struct Snapshot {
    pub config: MetadataConfig,
    pub roles: Vec<Role>,
    pub indexes: Indexes,
}

impl Snapshot {
    pub fn build(config: MetadataConfig, roles: Vec<Role>) -> Arc<Snapshot> {
        let indexes = Indexes::build(&config, &roles);
        Arc::new(Snapshot {
            config,
            roles,
            indexes,
        })
    }

    pub fn role(&self, id: &str) -> Option<&Role> {
        self.indexes.role_by_id(&self.roles, id)
    }

    pub fn table_by_api_name(&self, name: &str) -> Option<&qg_metadata::Table> {
        self.indexes.table_by_api_name(&self.config, name)
    }

    pub fn table_by_id(&self, id: &str) -> Option<&qg_metadata::Table> {
        self.indexes.table_by_id(&self.config, id)
    }

    pub fn database_by_id(&self, id: &str) -> Option<&qg_metadata::Database> {
        self.indexes.database_by_id(&self.config, id)
    }

    pub fn caches_for_table(&self, table_id: &str) -> Vec<&qg_metadata::Cache> {
        self.indexes.caches_for_table(&self.config, table_id)
    }

    pub fn syncs_for_table(&self, table_id: &str) -> Vec<&qg_metadata::ExternalSync> {
        self.indexes.syncs_for_table(&self.config, table_id)
    }
}
