use std::collections::{HashMap, HashSet};

use qg_errors::{PlannerError, PlannerErrorCode};
use qg_metadata::{Engine, Freshness, Lag};
use qg_query::{FilterEntry, QueryDefinition};
use qg_registry::Snapshot;

/// The dialect a plan targets, derived from the owning database's engine
/// (§4.4); `iceberg` and the federated strategy both always resolve to
/// `Federated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Clickhouse,
    Federated,
}

fn dialect_for_engine(engine: Engine) -> Dialect {
    match engine {
        Engine::Postgres => Dialect::Postgres,
        Engine::Clickhouse => Dialect::Clickhouse,
        Engine::Iceberg => Dialect::Federated,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Cache {
        cache_id: String,
        fallback_database: String,
        fallback_dialect: Dialect,
    },
    Direct {
        database: String,
        dialect: Dialect,
    },
    Materialized {
        database: String,
        dialect: Dialect,
        overrides: HashMap<String, String>,
    },
    Trino {
        catalogs: HashMap<String, String>,
    },
}

/// Collects every table apiName the query touches: `from`, `joins`, and
/// any table reached through an `exists`/nested filter (§4.4 P1).
fn involved_tables(def: &QueryDefinition) -> HashSet<String> {
    let mut tables = HashSet::new();
    tables.insert(def.from.clone());

    if let Some(joins) = &def.joins {
        for join in joins {
            tables.insert(join.table.clone());
            if let Some(filters) = &join.filters {
                collect_from_filters(filters, &mut tables);
            }
        }
    }
    if let Some(filters) = &def.filters {
        collect_from_filters(filters, &mut tables);
    }
    tables
}

fn collect_from_filters(filters: &[FilterEntry], out: &mut HashSet<String>) {
    for f in filters {
        match f {
            FilterEntry::Group(g) => collect_from_filters(&g.conditions, out),
            FilterEntry::Exists(e) => {
                out.insert(e.table.clone());
                if let Some(inner) = &e.filters {
                    collect_from_filters(inner, out);
                }
            }
            FilterEntry::ColumnCompare(c) => {
                if let Some(t) = &c.table {
                    out.insert(t.clone());
                }
                if let Some(t) = &c.ref_table {
                    out.insert(t.clone());
                }
            }
            FilterEntry::Value(v) => {
                if let Some(t) = &v.table {
                    out.insert(t.clone());
                }
            }
        }
    }
}

/// Selects a strategy for a validated query (§4.4). `trino_enabled` is a
/// deployment-level knob (not part of the metadata catalogue).
pub fn plan(def: &QueryDefinition, snapshot: &Snapshot, trino_enabled: bool) -> Result<Plan, PlannerError> {
    let involved = involved_tables(def);

    if let Some(p) = try_cache(def, snapshot, &involved) {
        return Ok(p);
    }

    let databases = involved_databases(snapshot, &involved);
    if databases.len() == 1 {
        let db_id = databases.into_iter().next().unwrap();
        let db = snapshot.database_by_id(&db_id).expect("involved database must exist");
        return Ok(Plan::Direct {
            database: db_id,
            dialect: dialect_for_engine(db.engine),
        });
    }

    if let Some(p) = try_materialized(def, snapshot, &involved, &databases) {
        return Ok(p);
    }

    if trino_enabled {
        let mut catalogs = HashMap::new();
        let mut missing = Vec::new();
        for db_id in &databases {
            let db = snapshot.database_by_id(db_id).expect("involved database must exist");
            match &db.federation_catalog {
                Some(catalog) => {
                    catalogs.insert(db_id.clone(), catalog.clone());
                }
                None => missing.push(db_id.clone()),
            }
        }
        if missing.is_empty() {
            return Ok(Plan::Trino { catalogs });
        }
        return Err(PlannerError::new(PlannerErrorCode::NoCatalog { missing }, Some(def.from.clone())));
    }

    if has_any_materialized_candidate(snapshot, &involved, &databases) {
        let (required, worst) = worst_blocking_lag(def, snapshot, &involved, &databases);
        return Err(PlannerError::new(
            PlannerErrorCode::FreshnessUnmet {
                required_freshness: freshness_str(required).to_string(),
                available_lag: lag_str(worst).to_string(),
            },
            Some(def.from.clone()),
        ));
    }

    if databases.len() > 1 {
        return Err(PlannerError::new(PlannerErrorCode::TrinoDisabled, Some(def.from.clone())));
    }

    let first_db = databases.into_iter().next();
    let unreachable: Vec<String> = involved
        .iter()
        .filter(|t| {
            snapshot
                .table_by_api_name(t)
                .map(|table| Some(&table.database) != first_db.as_ref())
                .unwrap_or(true)
        })
        .cloned()
        .collect();
    Err(PlannerError::new(PlannerErrorCode::UnreachableTables { tables: unreachable }, Some(def.from.clone())))
}

fn try_cache(def: &QueryDefinition, snapshot: &Snapshot, involved: &HashSet<String>) -> Option<Plan> {
    let by_ids = def.by_ids.as_ref()?;
    if by_ids.is_empty() {
        return None;
    }
    if def.joins.as_ref().map(|j| !j.is_empty()).unwrap_or(false) {
        return None;
    }
    if def.filters.as_ref().map(|f| !f.is_empty()).unwrap_or(false) {
        return None;
    }
    if involved.len() != 1 {
        return None;
    }
    let table = snapshot.table_by_api_name(&def.from)?;
    if table.primary_key.len() != 1 {
        return None;
    }

    let requested: HashSet<String> = def
        .columns
        .clone()
        .unwrap_or_else(|| table.columns.iter().map(|c| c.api_name.clone()).collect())
        .into_iter()
        .collect();

    for cache in snapshot.caches_for_table(&table.id) {
        for entry in &cache.entries {
            if entry.table_id != table.id {
                continue;
            }
            let covers_all = entry.columns.is_none();
            let covered: HashSet<String> = entry.columns.clone().unwrap_or_default().into_iter().collect();
            if covers_all || requested.is_subset(&covered) {
                let db = snapshot.database_by_id(&table.database)?;
                return Some(Plan::Cache {
                    cache_id: cache.id.clone(),
                    fallback_database: table.database.clone(),
                    fallback_dialect: dialect_for_engine(db.engine),
                });
            }
        }
    }
    None
}

fn involved_databases(snapshot: &Snapshot, involved: &HashSet<String>) -> HashSet<String> {
    involved
        .iter()
        .filter_map(|name| snapshot.table_by_api_name(name))
        .map(|t| t.database.clone())
        .collect()
}

/// Every database that could serve all involved tables either natively or
/// via a sync (§4.4 P2 candidate set), independent of the freshness gate.
/// Returned in catalogue declaration order so that `try_materialized`'s
/// tie-break among equal-scoring candidates is deterministic (§4.4, P2).
fn candidate_databases(snapshot: &Snapshot, involved: &HashSet<String>) -> Vec<String> {
    let mut candidates = HashSet::new();
    for name in involved {
        if let Some(table) = snapshot.table_by_api_name(name) {
            candidates.insert(table.database.clone());
            for sync in snapshot.syncs_for_table(&table.id) {
                candidates.insert(sync.target_database.clone());
            }
        }
    }
    snapshot
        .config
        .databases
        .iter()
        .map(|d| d.id.clone())
        .filter(|id| candidates.contains(id))
        .collect()
}

fn is_covered_by(snapshot: &Snapshot, table_name: &str, db_id: &str) -> Option<Option<Lag>> {
    let table = snapshot.table_by_api_name(table_name)?;
    if table.database == db_id {
        return Some(None);
    }
    snapshot
        .syncs_for_table(&table.id)
        .into_iter()
        .find(|s| s.target_database == db_id)
        .map(|s| Some(s.estimated_lag))
}

fn try_materialized(
    def: &QueryDefinition,
    snapshot: &Snapshot,
    involved: &HashSet<String>,
    _single_db: &HashSet<String>,
) -> Option<Plan> {
    let candidates = candidate_databases(snapshot, involved);
    let mut best: Option<(String, usize, Option<Lag>, HashMap<String, String>)> = None;

    for db_id in candidates {
        let mut worst_lag: Option<Lag> = None;
        let mut native_count = 0usize;
        let mut overrides = HashMap::new();
        let mut covers_all = true;

        for name in involved {
            match is_covered_by(snapshot, name, &db_id) {
                Some(None) => native_count += 1,
                Some(Some(lag)) => {
                    worst_lag = Some(worst_lag.map_or(lag, |w| w.max(lag)));
                    if let Some(table) = snapshot.table_by_api_name(name) {
                        if let Some(sync) = snapshot.syncs_for_table(&table.id).into_iter().find(|s| s.target_database == db_id) {
                            overrides.insert(table.id.clone(), sync.target_physical_name.clone());
                        }
                    }
                }
                None => {
                    covers_all = false;
                    break;
                }
            }
        }

        if !covers_all {
            continue;
        }
        if let Some(lag) = worst_lag {
            if !def.freshness.allows(lag) {
                continue;
            }
        }

        // Strict `>` keeps the first candidate seen on a tie; `candidates`
        // iterates in catalogue declaration order, so ties resolve to the
        // earliest-declared database (§4.4).
        let better = match &best {
            None => true,
            Some((_, best_native, _, _)) => native_count > *best_native,
        };
        if better {
            best = Some((db_id, native_count, worst_lag, overrides));
        }
    }

    best.map(|(database, _, _, overrides)| {
        let db = snapshot.database_by_id(&database).expect("candidate database must exist");
        Plan::Materialized {
            dialect: dialect_for_engine(db.engine),
            database,
            overrides,
        }
    })
}

fn has_any_materialized_candidate(snapshot: &Snapshot, involved: &HashSet<String>, _databases: &HashSet<String>) -> bool {
    for db_id in candidate_databases(snapshot, involved) {
        let covers_all = involved.iter().all(|name| is_covered_by(snapshot, name, &db_id).is_some());
        if covers_all {
            let uses_replica = involved
                .iter()
                .any(|name| matches!(is_covered_by(snapshot, name, &db_id), Some(Some(_))));
            if uses_replica {
                return true;
            }
        }
    }
    false
}

fn worst_blocking_lag(
    def: &QueryDefinition,
    snapshot: &Snapshot,
    involved: &HashSet<String>,
    _databases: &HashSet<String>,
) -> (Freshness, Lag) {
    let mut worst = Lag::Seconds;
    for db_id in candidate_databases(snapshot, involved) {
        let covers_all = involved.iter().all(|name| is_covered_by(snapshot, name, &db_id).is_some());
        if !covers_all {
            continue;
        }
        for name in involved {
            if let Some(Some(lag)) = is_covered_by(snapshot, name, &db_id) {
                worst = worst.max(lag);
            }
        }
    }
    (def.freshness, worst)
}

fn freshness_str(f: Freshness) -> &'static str {
    match f {
        Freshness::Realtime => "realtime",
        Freshness::Seconds => "seconds",
        Freshness::Minutes => "minutes",
        Freshness::Hours => "hours",
    }
}

fn lag_str(l: Lag) -> &'static str {
    match l {
        Lag::Seconds => "seconds",
        Lag::Minutes => "minutes",
        Lag::Hours => "hours",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qg_metadata::{Column, ColumnType, Database, ExternalSync, MetadataConfig, ScalarType, Table};
    use serde_json::json;

    fn table(id: &str, api_name: &str, database: &str) -> Table {
        Table {
            id: id.into(),
            api_name: api_name.into(),
            database: database.into(),
            physical_name: format!("public.{api_name}"),
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
    fn single_database_plans_direct() {
        let config = MetadataConfig {
            databases: vec![Database {
                id: "db1".into(),
                engine: Engine::Postgres,
                federation_catalog: None,
            }],
            tables: vec![table("t1", "orders", "db1")],
            caches: vec![],
            syncs: vec![],
        };
        let snapshot = Snapshot::build(config, vec![]);
        let def: QueryDefinition = serde_json::from_value(json!({ "from": "orders" })).unwrap();
        let plan = plan(&def, &snapshot, false).unwrap();
        assert!(matches!(plan, Plan::Direct { database, .. } if database == "db1"));
    }

    #[test]
    fn realtime_freshness_blocks_replica() {
        let config = MetadataConfig {
            databases: vec![
                Database {
                    id: "db1".into(),
                    engine: Engine::Postgres,
                    federation_catalog: None,
                },
                Database {
                    id: "db2".into(),
                    engine: Engine::Clickhouse,
                    federation_catalog: None,
                },
            ],
            tables: vec![table("t1", "orders", "db1"), table("t2", "events", "db2")],
            caches: vec![],
            syncs: vec![ExternalSync {
                source_table: "orders".into(),
                target_database: "db2".into(),
                target_physical_name: "orders_replica".into(),
                method: "cdc".into(),
                estimated_lag: Lag::Seconds,
            }],
        };
        let snapshot = Snapshot::build(config, vec![]);
        let def: QueryDefinition = serde_json::from_value(json!({
            "from": "orders",
            "joins": [{ "table": "events" }]
        }))
        .unwrap();
        let err = plan(&def, &snapshot, false).unwrap_err();
        assert!(matches!(err.code, PlannerErrorCode::FreshnessUnmet { .. }));
    }

    #[test]
    fn lenient_freshness_allows_replica() {
        let config = MetadataConfig {
            databases: vec![
                Database {
                    id: "db1".into(),
                    engine: Engine::Postgres,
                    federation_catalog: None,
                },
                Database {
                    id: "db2".into(),
                    engine: Engine::Clickhouse,
                    federation_catalog: None,
                },
            ],
            tables: vec![table("t1", "orders", "db1"), table("t2", "events", "db2")],
            caches: vec![],
            syncs: vec![ExternalSync {
                source_table: "orders".into(),
                target_database: "db2".into(),
                target_physical_name: "orders_replica".into(),
                method: "cdc".into(),
                estimated_lag: Lag::Seconds,
            }],
        };
        let snapshot = Snapshot::build(config, vec![]);
        let def: QueryDefinition = serde_json::from_value(json!({
            "from": "orders",
            "joins": [{ "table": "events" }],
            "freshness": "minutes"
        }))
        .unwrap();
        let plan = plan(&def, &snapshot, false).unwrap();
        assert!(matches!(plan, Plan::Materialized { database, .. } if database == "db2"));
    }
}
