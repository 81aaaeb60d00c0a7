use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use qg_errors::{ExecutionError, ExecutionErrorCode};
use qg_metadata::{CacheEntry, ExecutionContext, MaskingFn, Table};
use qg_planner::{Dialect, Plan};
use qg_query::{ExecuteMode, FilterEntry, QueryDefinition};
use qg_registry::{Registry, Snapshot};
use qg_resolve::{AggregationIr, ColumnMapping, SqlParts};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::CacheProvider;
use crate::error::PipelineError;
use crate::executor::Executor;
use crate::result::{ColumnDescriptor, PhaseTiming, QueryMeta, QueryResult, Strategy};

/// The identifier under which a Trino/federated executor is registered,
/// since a [`Plan::Trino`] spans catalogs rather than naming one database.
pub const TRINO_EXECUTOR_ID: &str = "trino";

/// Orchestrates C6 (validate) → C7 (plan) → C8 (resolve) → C9 (generate)
/// → executor/cache → masking, per §4.7. Owns the executors and cache
/// providers for its lifetime and releases them on [`Pipeline::shutdown`].
pub struct Pipeline {
    registry: Arc<Registry>,
    executors: HashMap<String, Arc<dyn Executor>>,
    caches: HashMap<String, Arc<dyn CacheProvider>>,
    trino_enabled: bool,
}

/// Per-target outcome of [`Pipeline::health_check`]: `true` means the
/// target answered `ping` successfully.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub healthy: bool,
    pub executors: HashMap<String, bool>,
    pub caches: HashMap<String, bool>,
}

impl Pipeline {
    pub fn new(
        registry: Arc<Registry>,
        executors: HashMap<String, Arc<dyn Executor>>,
        caches: HashMap<String, Arc<dyn CacheProvider>>,
        trino_enabled: bool,
    ) -> Self {
        Pipeline {
            registry,
            executors,
            caches,
            trino_enabled,
        }
    }

    /// Pings every configured executor and cache provider (§4.7).
    pub async fn health_check(&self) -> HealthReport {
        let mut executors = HashMap::new();
        for (id, executor) in &self.executors {
            executors.insert(id.clone(), executor.ping().await.is_ok());
        }
        let mut caches = HashMap::new();
        for (id, cache) in &self.caches {
            caches.insert(id.clone(), cache.ping().await.is_ok());
        }
        let healthy = executors.values().all(|ok| *ok) && caches.values().all(|ok| *ok);
        HealthReport {
            healthy,
            executors,
            caches,
        }
    }

    /// Releases every executor and cache provider, in reverse registration
    /// order (§5 resource scope). Registration order isn't tracked by a
    /// `HashMap`, so this closes whatever's left in iteration order; callers
    /// that care about strict reverse ordering should close resources they
    /// built themselves before dropping the pipeline.
    pub async fn shutdown(&self) {
        for cache in self.caches.values() {
            let _ = cache.close().await;
        }
        for executor in self.executors.values() {
            let _ = executor.close().await;
        }
    }

    pub async fn run(&self, def: &QueryDefinition, context: &ExecutionContext) -> Result<QueryResult, PipelineError> {
        let snapshot = self.registry.current();
        let mut debug_log: Option<Vec<String>> = if def.debug { Some(Vec::new()) } else { None };
        let mut timings: Option<Vec<PhaseTiming>> = if def.debug { Some(Vec::new()) } else { None };

        let t = Instant::now();
        qg_validate::validate_query(def, &snapshot, context)?;
        note_phase(&mut debug_log, &mut timings, "validate", t.elapsed());

        let t = Instant::now();
        let plan = qg_planner::plan(def, &snapshot, self.trino_enabled)?;
        note_phase(&mut debug_log, &mut timings, "plan", t.elapsed());

        let t = Instant::now();
        let mut parts = qg_resolve::resolve(def, &snapshot, context);
        if let Plan::Materialized { overrides, .. } = &plan {
            apply_overrides(&mut parts, def, &snapshot, overrides);
        }
        note_phase(&mut debug_log, &mut timings, "resolve", t.elapsed());

        let tables = collect_tables(def);
        let (strategy, database, dialect) = plan_summary(&plan);

        if let Plan::Cache {
            cache_id,
            fallback_database,
            fallback_dialect,
        } = &plan
        {
            if def.execute_mode == ExecuteMode::SqlOnly {
                let t = Instant::now();
                let generated = qg_dialect::generate(*fallback_dialect, &parts);
                note_phase(&mut debug_log, &mut timings, "generate", t.elapsed());
                let meta = build_meta(strategy, &database, dialect, tables, &parts, timings, debug_log);
                return Ok(QueryResult::Sql {
                    sql: generated.sql,
                    params: generated.params,
                    meta,
                });
            }

            let t = Instant::now();
            let data = self
                .run_cache(def, cache_id, fallback_database, *fallback_dialect, &snapshot, context, &parts)
                .await?;
            note_phase(&mut debug_log, &mut timings, "execute", t.elapsed());
            let meta = build_meta(strategy, &database, dialect, tables, &parts, timings, debug_log);
            return Ok(QueryResult::Data { data, meta });
        }

        let t = Instant::now();
        let generated = qg_dialect::generate(dialect, &parts);
        note_phase(&mut debug_log, &mut timings, "generate", t.elapsed());

        if def.execute_mode == ExecuteMode::SqlOnly {
            let meta = build_meta(strategy, &database, dialect, tables, &parts, timings, debug_log);
            return Ok(QueryResult::Sql {
                sql: generated.sql,
                params: generated.params,
                meta,
            });
        }

        let executor = self.executors.get(&database).cloned().ok_or_else(|| {
            PipelineError::Execution(ExecutionError::new(ExecutionErrorCode::ExecutorMissing {
                database: database.clone(),
            }))
        })?;

        let t = Instant::now();
        let rows = executor
            .execute(&generated.sql, &generated.params)
            .await
            .map_err(PipelineError::Execution)?;
        note_phase(&mut debug_log, &mut timings, "execute", t.elapsed());

        if let Some(log) = &debug_log {
            debug!(phases = ?log, "query pipeline completed");
        }

        if def.execute_mode == ExecuteMode::Count {
            let count = rows
                .first()
                .and_then(|r| r.get("count"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            let meta = build_meta(strategy, &database, dialect, tables, &parts, timings, debug_log);
            return Ok(QueryResult::Count { count, meta });
        }

        let t = Instant::now();
        let data: Vec<Value> = rows
            .iter()
            .map(|raw| shape_row(raw, &parts.column_mapping, &parts.aggregations, |m| row_key(dialect, m)))
            .collect();
        note_phase(&mut debug_log, &mut timings, "mask", t.elapsed());

        let meta = build_meta(strategy, &database, dialect, tables, &parts, timings, debug_log);
        Ok(QueryResult::Data { data, meta })
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_cache(
        &self,
        def: &QueryDefinition,
        cache_id: &str,
        fallback_database: &str,
        fallback_dialect: Dialect,
        snapshot: &Snapshot,
        context: &ExecutionContext,
        parts: &SqlParts,
    ) -> Result<Vec<Value>, PipelineError> {
        let table = snapshot
            .table_by_api_name(&def.from)
            .expect("validated query names an existing table");
        let pk_name = table.primary_key[0].clone();
        let requested: HashSet<String> = def
            .columns
            .clone()
            .unwrap_or_else(|| table.columns.iter().map(|c| c.api_name.clone()).collect())
            .into_iter()
            .collect();
        let entry = find_cache_entry(snapshot, cache_id, table, &requested)
            .expect("planner only selects Plan::Cache when a covering entry exists");
        let by_ids = def.by_ids.clone().unwrap_or_default();

        let keys: Vec<String> = by_ids.iter().map(|id| render_cache_key(&entry.key_pattern, &pk_name, id)).collect();

        let cache = self.caches.get(cache_id).cloned().ok_or_else(|| {
            PipelineError::Execution(ExecutionError::new(ExecutionErrorCode::CacheProviderMissing {
                cache_id: cache_id.to_string(),
            }))
        })?;
        let hits = cache.get_many(&keys).await.map_err(PipelineError::Connection)?;

        let mut by_id_row: HashMap<String, Value> = HashMap::new();
        let mut missing_ids: Vec<Value> = Vec::new();
        for id in &by_ids {
            let key = render_cache_key(&entry.key_pattern, &pk_name, id);
            match hits.get(&key) {
                Some(raw) => {
                    let shaped = shape_row(raw, &parts.column_mapping, &parts.aggregations, |m| m.api_name.clone());
                    by_id_row.insert(id_key(id), shaped);
                }
                None => missing_ids.push(id.clone()),
            }
        }

        if !missing_ids.is_empty() {
            let mut fallback_def = def.clone();
            fallback_def.by_ids = Some(missing_ids);
            let pk_was_requested = fallback_def.columns.as_ref().map(|c| c.iter().any(|n| n == &pk_name)).unwrap_or(true);
            if let Some(cols) = &mut fallback_def.columns {
                if !cols.iter().any(|n| n == &pk_name) {
                    cols.push(pk_name.clone());
                }
            }
            let fallback_parts = qg_resolve::resolve(&fallback_def, snapshot, context);
            let generated = qg_dialect::generate(fallback_dialect, &fallback_parts);

            let executor = self.executors.get(fallback_database).cloned().ok_or_else(|| {
                PipelineError::Execution(ExecutionError::new(ExecutionErrorCode::ExecutorMissing {
                    database: fallback_database.to_string(),
                }))
            })?;
            let rows = executor
                .execute(&generated.sql, &generated.params)
                .await
                .map_err(PipelineError::Execution)?;

            let pk_mapping = fallback_parts
                .column_mapping
                .iter()
                .find(|m| m.api_name == pk_name)
                .expect("primary key column is always forced into the fallback selection");

            for raw in &rows {
                let pk_value = raw.get(row_key(fallback_dialect, pk_mapping)).cloned().unwrap_or(Value::Null);
                let mut shaped = shape_row(raw, &fallback_parts.column_mapping, &fallback_parts.aggregations, |m| {
                    row_key(fallback_dialect, m)
                });
                if !pk_was_requested {
                    if let Value::Object(ref mut map) = shaped {
                        map.remove(&pk_name);
                    }
                }
                by_id_row.insert(id_key(&pk_value), shaped);
            }
        }

        Ok(by_ids.iter().filter_map(|id| by_id_row.get(&id_key(id)).cloned()).collect())
    }
}

fn note_phase(debug_log: &mut Option<Vec<String>>, timings: &mut Option<Vec<PhaseTiming>>, phase: &str, elapsed: std::time::Duration) {
    if let Some(log) = debug_log {
        log.push(format!("{phase}: {}us", elapsed.as_micros()));
    }
    if let Some(t) = timings {
        t.push(PhaseTiming {
            phase: phase.to_string(),
            millis: elapsed.as_millis() as u64,
        });
    }
}

fn plan_summary(plan: &Plan) -> (Strategy, String, Dialect) {
    match plan {
        Plan::Direct { database, dialect } => (Strategy::Direct, database.clone(), *dialect),
        Plan::Materialized { database, dialect, .. } => (Strategy::Materialized, database.clone(), *dialect),
        Plan::Trino { .. } => (Strategy::Trino, TRINO_EXECUTOR_ID.to_string(), Dialect::Federated),
        Plan::Cache {
            fallback_database,
            fallback_dialect,
            ..
        } => (Strategy::Cache, fallback_database.clone(), *fallback_dialect),
    }
}

fn apply_overrides(parts: &mut SqlParts, def: &QueryDefinition, snapshot: &Snapshot, overrides: &HashMap<String, String>) {
    if let Some(table) = snapshot.table_by_api_name(&def.from) {
        if let Some(target) = overrides.get(&table.id) {
            parts.from.physical_name = target.clone();
        }
    }
    if let Some(joins_def) = &def.joins {
        for (join_def, join_ir) in joins_def.iter().zip(parts.joins.iter_mut()) {
            if let Some(table) = snapshot.table_by_api_name(&join_def.table) {
                if let Some(target) = overrides.get(&table.id) {
                    join_ir.table.physical_name = target.clone();
                }
            }
        }
    }
}

fn dialect_str(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Postgres => "postgres",
        Dialect::Clickhouse => "clickhouse",
        Dialect::Federated => "federated",
    }
}

/// The key an executor's row is expected to carry for one selected column,
/// mirroring the column-select aliasing rule in §4.6: ClickHouse selects
/// the bare physical name, Postgres and the federated dialect prefix with
/// the table alias to preserve provenance.
fn row_key(dialect: Dialect, mapping: &ColumnMapping) -> String {
    match dialect {
        Dialect::Clickhouse => mapping.column.physical_name.clone(),
        _ => format!("{}__{}", mapping.column.table_alias, mapping.column.physical_name),
    }
}

/// Builds the client-facing row: every selected column under its
/// `output_name`, masked where required, plus every aggregation alias
/// passed through unmasked (§4.7).
fn shape_row(
    raw: &Value,
    mappings: &[ColumnMapping],
    aggregations: &[AggregationIr],
    key_fn: impl Fn(&ColumnMapping) -> String,
) -> Value {
    let mut out = serde_json::Map::new();
    for m in mappings {
        let key = key_fn(m);
        let value = raw.get(&key).cloned().unwrap_or(Value::Null);
        let value = if m.masked {
            qg_access::mask(&value, m.masking_fn.unwrap_or(MaskingFn::Full))
        } else {
            value
        };
        out.insert(m.output_name.clone(), value);
    }
    for agg in aggregations {
        let value = raw.get(&agg.alias).cloned().unwrap_or(Value::Null);
        out.insert(agg.alias.clone(), value);
    }
    Value::Object(out)
}

fn build_meta(
    strategy: Strategy,
    database: &str,
    dialect: Dialect,
    tables: Vec<String>,
    parts: &SqlParts,
    timings: Option<Vec<PhaseTiming>>,
    debug_log: Option<Vec<String>>,
) -> QueryMeta {
    let columns = parts
        .column_mapping
        .iter()
        .map(|m| ColumnDescriptor {
            api_name: m.output_name.clone(),
            masked: m.masked,
            column_type: Some(m.column_type),
        })
        .collect();
    QueryMeta {
        strategy,
        database: database.to_string(),
        dialect: dialect_str(dialect).to_string(),
        tables,
        columns,
        phase_timings: timings,
        debug_log,
    }
}

fn find_cache_entry<'a>(snapshot: &'a Snapshot, cache_id: &str, table: &Table, requested: &HashSet<String>) -> Option<&'a CacheEntry> {
    snapshot
        .caches_for_table(&table.id)
        .into_iter()
        .filter(|c| c.id == cache_id)
        .flat_map(|c| c.entries.iter())
        .find(|entry| {
            entry.table_id == table.id
                && match &entry.columns {
                    None => true,
                    Some(cols) => {
                        let covered: HashSet<&str> = cols.iter().map(|s| s.as_str()).collect();
                        requested.iter().all(|r| covered.contains(r.as_str()))
                    }
                }
        })
}

fn render_cache_key(pattern: &str, pk_name: &str, id: &Value) -> String {
    let placeholder = format!("{{{pk_name}}}");
    let fragment = match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    pattern.replace(&placeholder, &fragment)
}

/// A stable textual key for a `byIds` value, used only to correlate cache
/// misses with their fallback-query rows; never sent anywhere.
fn id_key(id: &Value) -> String {
    id.to_string()
}

/// Every table apiName a query touches: `from`, joins, and any table
/// reached through an `exists`/nested filter, mirroring the set the
/// planner computes for routing (§4.4 P1).
fn collect_tables(def: &QueryDefinition) -> Vec<String> {
    let mut set = HashSet::new();
    set.insert(def.from.clone());
    if let Some(joins) = &def.joins {
        for j in joins {
            set.insert(j.table.clone());
            if let Some(filters) = &j.filters {
                collect_from_filters(filters, &mut set);
            }
        }
    }
    if let Some(filters) = &def.filters {
        collect_from_filters(filters, &mut set);
    }
    let mut tables: Vec<String> = set.into_iter().collect();
    tables.sort();
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
