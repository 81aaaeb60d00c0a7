use std::collections::HashMap;

use crate::catalog::{Cache, Database, ExternalSync, MetadataConfig, Role, Table};

/// Fast lookups over a [`MetadataConfig`] plus the roles provider, built
/// once when a snapshot loads. Readers never walk the raw `Vec`s.
#[derive(Debug, Default)]
pub struct Indexes {
    tables_by_api_name: HashMap<String, usize>,
    tables_by_id: HashMap<String, usize>,
    databases_by_id: HashMap<String, usize>,
    columns_by_table_and_name: HashMap<(String, String), usize>,
    caches_by_table_id: HashMap<String, Vec<usize>>,
    syncs_by_source_table: HashMap<String, Vec<usize>>,
    roles_by_id: HashMap<String, usize>,
}

impl Indexes {
    pub fn build(config: &MetadataConfig, roles: &[Role]) -> Indexes {
        let mut idx = Indexes::default();

        for (i, db) in config.databases.iter().enumerate() {
            idx.databases_by_id.insert(db.id.clone(), i);
        }

        for (i, table) in config.tables.iter().enumerate() {
            idx.tables_by_api_name.insert(table.api_name.clone(), i);
            idx.tables_by_id.insert(table.id.clone(), i);
            for (j, col) in table.columns.iter().enumerate() {
                idx.columns_by_table_and_name
                    .insert((table.id.clone(), col.api_name.clone()), j);
            }
        }

        for (i, cache) in config.caches.iter().enumerate() {
            for entry in &cache.entries {
                idx.caches_by_table_id
                    .entry(entry.table_id.clone())
                    .or_default()
                    .push(i);
            }
        }

        for (i, sync) in config.syncs.iter().enumerate() {
            idx.syncs_by_source_table
                .entry(sync.source_table.clone())
                .or_default()
                .push(i);
        }

        for (i, role) in roles.iter().enumerate() {
            idx.roles_by_id.insert(role.id.clone(), i);
        }

        idx
    }

    pub fn table_by_api_name<'a>(&self, config: &'a MetadataConfig, name: &str) -> Option<&'a Table> {
        self.tables_by_api_name.get(name).map(|&i| &config.tables[i])
    }

    pub fn table_by_id<'a>(&self, config: &'a MetadataConfig, id: &str) -> Option<&'a Table> {
        self.tables_by_id.get(id).map(|&i| &config.tables[i])
    }

    pub fn database_by_id<'a>(&self, config: &'a MetadataConfig, id: &str) -> Option<&'a Database> {
        self.databases_by_id.get(id).map(|&i| &config.databases[i])
    }

    pub fn caches_for_table<'a>(&self, config: &'a MetadataConfig, table_id: &str) -> Vec<&'a Cache> {
        self.caches_by_table_id
            .get(table_id)
            .into_iter()
            .flatten()
            .map(|&i| &config.caches[i])
            .collect()
    }

    pub fn syncs_for_table<'a>(&self, config: &'a MetadataConfig, table_id: &str) -> Vec<&'a ExternalSync> {
        self.syncs_by_source_table
            .get(table_id)
            .into_iter()
            .flatten()
            .map(|&i| &config.syncs[i])
            .collect()
    }

    pub fn role_by_id<'a>(&self, roles: &'a [Role], id: &str) -> Option<&'a Role> {
        self.roles_by_id.get(id).map(|&i| &roles[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, ColumnType, Engine, ScalarType, Table};

    fn sample_config() -> MetadataConfig {
        MetadataConfig {
            databases: vec![Database {
                id: "db1".into(),
                engine: Engine::Postgres,
                federation_catalog: None,
            }],
            tables: vec![Table {
                id: "t1".into(),
                api_name: "orders".into(),
                database: "db1".into(),
                physical_name: "public.orders".into(),
                columns: vec![Column {
                    api_name: "id".into(),
                    physical_name: "id".into(),
                    r#type: ColumnType::scalar(ScalarType::Uuid),
                    nullable: false,
                    masking_fn: None,
                }],
                primary_key: vec!["id".into()],
                relations: vec![],
            }],
            caches: vec![],
            syncs: vec![],
        }
    }

    #[test]
    fn resolves_table_by_api_name_and_id() {
        let config = sample_config();
        let idx = Indexes::build(&config, &[]);
        assert_eq!(idx.table_by_api_name(&config, "orders").unwrap().id, "t1");
        assert_eq!(idx.table_by_id(&config, "t1").unwrap().api_name, "orders");
        assert!(idx.table_by_api_name(&config, "missing").is_none());
    }
}
