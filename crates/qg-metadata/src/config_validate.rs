use std::collections::{HashMap, HashSet};

use qg_errors::{ConfigError, ConfigErrorCode, Entry};
use serde_json::json;

use crate::catalog::MetadataConfig;
use crate::names::is_valid_api_name;

/// Walks a whole [`MetadataConfig`] and collects every structural/semantic
/// issue (§4.1) rather than stopping at the first. Returns `Ok(())` only
/// when the catalogue is fully consistent.
pub fn validate_config(config: &MetadataConfig) -> Result<(), ConfigError> {
    let mut entries = Vec::new();

    let db_ids: HashSet<&str> = config.databases.iter().map(|d| d.id.as_str()).collect();

    let mut seen_table_names: HashMap<&str, usize> = HashMap::new();
    for table in &config.tables {
        *seen_table_names.entry(table.api_name.as_str()).or_insert(0) += 1;
    }

    for (i, table) in config.tables.iter().enumerate() {
        if !is_valid_api_name(&table.api_name) {
            entries.push(
                Entry::new(ConfigErrorCode::InvalidApiName.as_str(), format!(
                    "table apiName {:?} is not a valid identifier",
                    table.api_name
                ))
                .with_details(json!({ "entity": "table", "field": "apiName", "actual": table.api_name })),
            );
        }

        if seen_table_names.get(table.api_name.as_str()).copied().unwrap_or(0) > 1 {
            entries.push(
                Entry::new(
                    ConfigErrorCode::DuplicateApiName.as_str(),
                    format!("table apiName {:?} is used more than once", table.api_name),
                )
                .with_details(json!({ "entity": "table", "field": "apiName", "actual": table.api_name })),
            );
        }

        if !db_ids.contains(table.database.as_str()) {
            entries.push(
                Entry::new(
                    ConfigErrorCode::InvalidReference.as_str(),
                    format!("table {:?} references unknown database {:?}", table.api_name, table.database),
                )
                .with_details(json!({
                    "entity": "table", "field": "database",
                    "expected": "existing database id", "actual": table.database,
                    "database": table.database,
                })),
            );
        }

        let mut seen_column_names: HashMap<&str, usize> = HashMap::new();
        for col in &table.columns {
            *seen_column_names.entry(col.api_name.as_str()).or_insert(0) += 1;
        }
        for col in &table.columns {
            if !is_valid_api_name(&col.api_name) {
                entries.push(
                    Entry::new(
                        ConfigErrorCode::InvalidApiName.as_str(),
                        format!("column apiName {:?} on table {:?} is not a valid identifier", col.api_name, table.api_name),
                    )
                    .with_details(json!({ "entity": "column", "field": "apiName", "actual": col.api_name })),
                );
            }
            if seen_column_names.get(col.api_name.as_str()).copied().unwrap_or(0) > 1 {
                entries.push(
                    Entry::new(
                        ConfigErrorCode::DuplicateApiName.as_str(),
                        format!("column apiName {:?} is duplicated on table {:?}", col.api_name, table.api_name),
                    )
                    .with_details(json!({ "entity": "column", "field": "apiName", "actual": col.api_name })),
                );
            }
        }

        for pk in &table.primary_key {
            if table.column(pk).is_none() {
                entries.push(
                    Entry::new(
                        ConfigErrorCode::InvalidReference.as_str(),
                        format!("primaryKey entry {:?} is not a column of table {:?}", pk, table.api_name),
                    )
                    .with_details(json!({ "entity": "table", "field": "primaryKey", "expected": "existing column apiName", "actual": pk })),
                );
            }
        }

        for rel in &table.relations {
            if table.column(&rel.column).is_none() {
                entries.push(
                    Entry::new(
                        ConfigErrorCode::InvalidRelation.as_str(),
                        format!("relation source column {:?} does not exist on table {:?}", rel.column, table.api_name),
                    )
                    .with_details(json!({ "entity": "relation", "field": "column", "actual": rel.column })),
                );
            }
            match config.tables.iter().find(|t| t.api_name == rel.references.table) {
                None => entries.push(
                    Entry::new(
                        ConfigErrorCode::InvalidRelation.as_str(),
                        format!("relation on table {:?} references unknown table {:?}", table.api_name, rel.references.table),
                    )
                    .with_details(json!({ "entity": "relation", "field": "references.table", "actual": rel.references.table })),
                ),
                Some(target) => {
                    if target.column(&rel.references.column).is_none() {
                        entries.push(
                            Entry::new(
                                ConfigErrorCode::InvalidRelation.as_str(),
                                format!(
                                    "relation on table {:?} references unknown column {:?} on table {:?}",
                                    table.api_name, rel.references.column, rel.references.table
                                ),
                            )
                            .with_details(json!({
                                "entity": "relation", "field": "references.column",
                                "actual": rel.references.column,
                            })),
                        );
                    }
                }
            }
        }

        let _ = i;
    }

    let table_by_id: HashMap<&str, &crate::catalog::Table> =
        config.tables.iter().map(|t| (t.id.as_str(), t)).collect();

    for sync in &config.syncs {
        if !config.tables.iter().any(|t| t.api_name == sync.source_table) {
            entries.push(
                Entry::new(
                    ConfigErrorCode::InvalidSync.as_str(),
                    format!("sync references unknown source table {:?}", sync.source_table),
                )
                .with_details(json!({ "entity": "sync", "field": "sourceTable", "actual": sync.source_table })),
            );
        }
        if !db_ids.contains(sync.target_database.as_str()) {
            entries.push(
                Entry::new(
                    ConfigErrorCode::InvalidSync.as_str(),
                    format!("sync references unknown target database {:?}", sync.target_database),
                )
                .with_details(json!({
                    "entity": "sync", "field": "targetDatabase",
                    "actual": sync.target_database, "database": sync.target_database,
                })),
            );
        }
    }

    for cache in &config.caches {
        for entry in &cache.entries {
            let table = table_by_id.get(entry.table_id.as_str());
            match table {
                None => entries.push(
                    Entry::new(
                        ConfigErrorCode::InvalidCache.as_str(),
                        format!("cache entry references unknown table id {:?}", entry.table_id),
                    )
                    .with_details(json!({ "entity": "cache", "field": "tableId", "actual": entry.table_id, "cacheId": cache.id })),
                ),
                Some(table) => {
                    for placeholder in extract_placeholders(&entry.key_pattern) {
                        if table.column(&placeholder).is_none() {
                            entries.push(
                                Entry::new(
                                    ConfigErrorCode::InvalidCache.as_str(),
                                    format!(
                                        "cache keyPattern {:?} references unknown column {:?} on table {:?}",
                                        entry.key_pattern, placeholder, table.api_name
                                    ),
                                )
                                .with_details(json!({
                                    "entity": "cache", "field": "keyPattern",
                                    "actual": placeholder, "cacheId": cache.id,
                                })),
                            );
                        }
                    }
                    if let Some(cols) = &entry.columns {
                        for col in cols {
                            if table.column(col).is_none() {
                                entries.push(
                                    Entry::new(
                                        ConfigErrorCode::InvalidCache.as_str(),
                                        format!("cache columns entry {:?} is not a column of table {:?}", col, table.api_name),
                                    )
                                    .with_details(json!({
                                        "entity": "cache", "field": "columns",
                                        "actual": col, "cacheId": cache.id,
                                    })),
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    if entries.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::new(entries))
    }
}

/// Extracts every `{name}` placeholder from a cache key pattern.
fn extract_placeholders(pattern: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = pattern.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c == '{' {
            let mut name = String::new();
            for (_, c2) in chars.by_ref() {
                if c2 == '}' {
                    break;
                }
                name.push(c2);
            }
            if !name.is_empty() {
                out.push(name);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, ColumnType, Database, Engine, ScalarType, Table};

    fn base_table() -> Table {
        Table {
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
        }
    }

    #[test]
    fn accepts_consistent_catalog() {
        let config = MetadataConfig {
            databases: vec![Database {
                id: "db1".into(),
                engine: Engine::Postgres,
                federation_catalog: None,
            }],
            tables: vec![base_table()],
            caches: vec![],
            syncs: vec![],
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_all_issues_not_just_first() {
        let mut table = base_table();
        table.database = "missing-db".into();
        table.primary_key = vec!["missing-col".into()];
        let config = MetadataConfig {
            databases: vec![],
            tables: vec![table],
            caches: vec![],
            syncs: vec![],
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.entries.len() >= 2);
    }

    #[test]
    fn rejects_duplicate_table_names() {
        let config = MetadataConfig {
            databases: vec![Database {
                id: "db1".into(),
                engine: Engine::Postgres,
                federation_catalog: None,
            }],
            tables: vec![base_table(), {
                let mut t = base_table();
                t.id = "t2".into();
                t
            }],
            caches: vec![],
            syncs: vec![],
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.entries.iter().any(|e| e.code == "DUPLICATE_API_NAME"));
    }
}
