use std::collections::{HashMap, HashSet};

use qg_access::effective_table_access;
use qg_errors::{Entry, ValidationError};
use qg_metadata::{ExecutionContext, Table};
use qg_query::{
    Aggregation, ColumnCompareFilter, ExistsFilter, FilterEntry, Join, OrderBy, QueryDefinition,
    ValueFilter,
};
use qg_registry::Snapshot;
use serde_json::Value;

/// Validates a query definition against a snapshot and execution context
/// (§4.3). Walks the whole query and collects every issue; never stops at
/// the first.
pub fn validate_query(
    def: &QueryDefinition,
    snapshot: &Snapshot,
    context: &ExecutionContext,
) -> Result<(), ValidationError> {
    let mut v = Validator {
        snapshot,
        context,
        entries: Vec::new(),
        tables: HashMap::new(),
        selected: HashSet::new(),
        group_by: HashSet::new(),
        agg_aliases: HashSet::new(),
    };
    v.run(def);

    if v.entries.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(Some(def.from.clone()), v.entries))
    }
}

struct Validator<'a> {
    snapshot: &'a Snapshot,
    context: &'a ExecutionContext,
    entries: Vec<Entry>,
    /// Every table apiName reachable in this query (from table + joins),
    /// mapped to its metadata.
    tables: HashMap<String, &'a Table>,
    selected: HashSet<String>,
    group_by: HashSet<String>,
    agg_aliases: HashSet<String>,
}

impl<'a> Validator<'a> {
    fn push(&mut self, code: &str, message: impl Into<String>, details: Value) {
        self.entries.push(Entry::new(code, message).with_details(details));
    }

    fn run(&mut self, def: &QueryDefinition) {
        let Some(from_table) = self.snapshot.table_by_api_name(&def.from) else {
            self.push(
                "UNKNOWN_TABLE",
                format!("unknown table {:?}", def.from),
                serde_json::json!({ "table": def.from }),
            );
            return;
        };
        self.tables.insert(def.from.clone(), from_table);

        if let Some(joins) = &def.joins {
            for join in joins {
                self.check_join(from_table, join);
            }
        }

        self.check_columns(def, from_table);

        if let Some(filters) = &def.filters {
            for f in filters {
                self.check_filter_entry(from_table, f);
            }
        }

        if let Some(group_by) = &def.group_by {
            for gb in group_by {
                self.group_by.insert(gb.column.clone());
                let table = match &gb.table {
                    Some(name) => self.resolve_table(name),
                    None => Some(from_table),
                };
                if table.map(|t| t.column(&gb.column).is_none()).unwrap_or(false) {
                    self.push(
                        "INVALID_GROUP_BY",
                        format!("groupBy column {:?} does not exist on {:?}", gb.column, from_table.api_name),
                        serde_json::json!({ "column": gb.column }),
                    );
                }
            }
        }

        if let Some(aggregations) = &def.aggregations {
            for agg in aggregations {
                self.check_aggregation(from_table, agg);
            }
        }

        if let Some(having) = &def.having {
            for f in having {
                self.check_having_entry(f);
            }
        }

        if let Some(order_by) = &def.order_by {
            for ob in order_by {
                self.check_order_by(ob);
            }
        }

        if let Some(limit) = def.limit {
            if limit < 0 {
                self.push(
                    "INVALID_LIMIT",
                    "limit must be a non-negative integer",
                    serde_json::json!({ "field": "limit", "actual": limit }),
                );
            }
        }
        if let Some(offset) = def.offset {
            if offset < 0 {
                self.push(
                    "INVALID_LIMIT",
                    "offset must be a non-negative integer",
                    serde_json::json!({ "field": "offset", "actual": offset }),
                );
            }
        }

        if let Some(by_ids) = &def.by_ids {
            self.check_by_ids(from_table, by_ids);
        }

        self.check_access(def, from_table);
    }

    fn resolve_table(&mut self, api_name: &str) -> Option<&'a Table> {
        if let Some(t) = self.tables.get(api_name) {
            return Some(*t);
        }
        match self.snapshot.table_by_api_name(api_name) {
            Some(t) => {
                self.tables.insert(api_name.to_string(), t);
                Some(t)
            }
            None => {
                self.push(
                    "UNKNOWN_TABLE",
                    format!("unknown table {api_name:?}"),
                    serde_json::json!({ "table": api_name }),
                );
                None
            }
        }
    }

    fn has_relation(a: &Table, b: &Table) -> bool {
        a.relations.iter().any(|r| r.references.table == b.api_name)
            || b.relations.iter().any(|r| r.references.table == a.api_name)
    }

    fn check_join(&mut self, from_table: &'a Table, join: &Join) {
        let Some(target) = self.resolve_table(&join.table) else {
            return;
        };
        if !Self::has_relation(from_table, target) {
            self.push(
                "INVALID_JOIN",
                format!(
                    "no relation between {:?} and {:?}",
                    from_table.api_name, join.table
                ),
                serde_json::json!({ "table": join.table }),
            );
        }
        if let Some(filters) = &join.filters {
            for f in filters {
                self.check_filter_entry(target, f);
            }
        }
    }

    fn check_columns(&mut self, def: &QueryDefinition, from_table: &'a Table) {
        if let Some(columns) = &def.columns {
            for col in columns {
                self.selected.insert(col.clone());
                if from_table.column(col).is_none() {
                    self.push(
                        "UNKNOWN_COLUMN",
                        format!("unknown column {col:?} on table {:?}", from_table.api_name),
                        serde_json::json!({ "table": from_table.api_name, "column": col }),
                    );
                }
            }
        }
    }

    fn table_for(&mut self, default: &'a Table, table: &Option<String>) -> Option<&'a Table> {
        match table {
            Some(name) => self.resolve_table(name),
            None => Some(default),
        }
    }

    fn check_filter_entry(&mut self, default_table: &'a Table, entry: &FilterEntry) {
        match entry {
            FilterEntry::Group(g) => {
                for c in &g.conditions {
                    self.check_filter_entry(default_table, c);
                }
            }
            FilterEntry::Exists(e) => self.check_exists(default_table, e),
            FilterEntry::ColumnCompare(c) => self.check_column_compare(default_table, c),
            FilterEntry::Value(v) => self.check_value_filter(default_table, v),
        }
    }

    fn check_value_filter(&mut self, default_table: &'a Table, f: &ValueFilter) {
        let Some(table) = self.table_for(default_table, &f.table) else {
            return;
        };
        let Some(column) = table.column(&f.column) else {
            self.push(
                "UNKNOWN_COLUMN",
                format!("unknown column {:?} on table {:?}", f.column, table.api_name),
                serde_json::json!({ "table": table.api_name, "column": f.column }),
            );
            return;
        };

        if f.operator.is_nullary() {
            return;
        }
        let Some(value) = &f.value else {
            self.push(
                "INVALID_VALUE",
                format!("operator {:?} requires a value", f.operator),
                serde_json::json!({ "column": f.column, "operator": f.operator }),
            );
            return;
        };

        if f.operator.requires_array_column() && !column.r#type.array {
            self.push(
                "INVALID_FILTER",
                format!("operator {:?} requires an array column", f.operator),
                serde_json::json!({ "column": f.column, "operator": f.operator }),
            );
        }

        if f.operator.requires_array_value() && !value.is_array() {
            self.push(
                "INVALID_VALUE",
                format!("operator {:?} requires an array value", f.operator),
                serde_json::json!({ "column": f.column, "operator": f.operator }),
            );
        }

        if f.operator.requires_between_value() {
            let ok = value
                .as_object()
                .map(|o| o.contains_key("from") && o.contains_key("to"))
                .unwrap_or(false);
            if !ok {
                self.push(
                    "INVALID_VALUE",
                    "between/notBetween value must be {from, to}",
                    serde_json::json!({ "column": f.column, "operator": f.operator }),
                );
            }
        }

        if f.operator.requires_levenshtein_value() {
            let ok = value
                .as_object()
                .map(|o| {
                    o.get("text").map(Value::is_string).unwrap_or(false)
                        && o.get("maxDistance")
                            .and_then(Value::as_i64)
                            .map(|n| n >= 0)
                            .unwrap_or(false)
                })
                .unwrap_or(false);
            if !ok {
                self.push(
                    "INVALID_VALUE",
                    "levenshteinLte value must be {text, maxDistance: non-negative integer}",
                    serde_json::json!({ "column": f.column, "operator": f.operator }),
                );
            }
        }
    }

    fn check_column_compare(&mut self, default_table: &'a Table, f: &ColumnCompareFilter) {
        let Some(table) = self.table_for(default_table, &f.table) else {
            return;
        };
        if table.column(&f.column).is_none() {
            self.push(
                "UNKNOWN_COLUMN",
                format!("unknown column {:?} on table {:?}", f.column, table.api_name),
                serde_json::json!({ "table": table.api_name, "column": f.column }),
            );
        }
        let Some(ref_table) = self.table_for(default_table, &f.ref_table) else {
            return;
        };
        if ref_table.column(&f.ref_column).is_none() {
            self.push(
                "UNKNOWN_COLUMN",
                format!("unknown column {:?} on table {:?}", f.ref_column, ref_table.api_name),
                serde_json::json!({ "table": ref_table.api_name, "column": f.ref_column }),
            );
        }
    }

    fn check_exists(&mut self, default_table: &'a Table, e: &ExistsFilter) {
        let Some(target) = self.resolve_table(&e.table) else {
            return;
        };
        if !Self::has_relation(default_table, target) {
            self.push(
                "INVALID_EXISTS",
                format!(
                    "no relation path between {:?} and {:?}",
                    default_table.api_name, e.table
                ),
                serde_json::json!({ "table": e.table }),
            );
        }
        if let Some(filters) = &e.filters {
            for f in filters {
                self.check_filter_entry(target, f);
            }
        }
    }

    fn check_aggregation(&mut self, from_table: &'a Table, agg: &Aggregation) {
        if !qg_metadata::is_valid_api_name(&agg.alias) {
            self.push(
                "INVALID_AGGREGATION",
                format!("aggregation alias {:?} is not a valid apiName", agg.alias),
                serde_json::json!({ "alias": agg.alias }),
            );
        }
        self.agg_aliases.insert(agg.alias.clone());

        if let Some(col_name) = agg.column.column_name() {
            let table = match &agg.table {
                Some(name) => self.resolve_table(name),
                None => Some(from_table),
            };
            if let Some(table) = table {
                if table.column(col_name).is_none() {
                    self.push(
                        "UNKNOWN_COLUMN",
                        format!("unknown aggregation column {col_name:?} on table {:?}", table.api_name),
                        serde_json::json!({ "table": table.api_name, "column": col_name }),
                    );
                }
            }
        }
    }

    fn check_having_entry(&mut self, entry: &FilterEntry) {
        match entry {
            FilterEntry::Group(g) => {
                for c in &g.conditions {
                    self.check_having_entry(c);
                }
            }
            FilterEntry::Value(v) => {
                if !self.agg_aliases.contains(&v.column) && !self.group_by.contains(&v.column) {
                    self.push(
                        "INVALID_HAVING",
                        format!(
                            "having column {:?} must reference an aggregation alias or groupBy column",
                            v.column
                        ),
                        serde_json::json!({ "column": v.column }),
                    );
                }
            }
            _ => self.push(
                "INVALID_HAVING",
                "having only supports value filters and groups over aggregation aliases or groupBy columns",
                serde_json::json!({}),
            ),
        }
    }

    fn check_order_by(&mut self, ob: &OrderBy) {
        if !self.selected.contains(&ob.column)
            && !self.group_by.contains(&ob.column)
            && !self.agg_aliases.contains(&ob.column)
        {
            self.push(
                "INVALID_ORDER_BY",
                format!(
                    "orderBy column {:?} must reference a selected column, groupBy column, or aggregation alias",
                    ob.column
                ),
                serde_json::json!({ "column": ob.column }),
            );
        }
    }

    fn check_by_ids(&mut self, table: &'a Table, by_ids: &[Value]) {
        if table.primary_key.len() != 1 {
            self.push(
                "INVALID_BY_IDS",
                format!("byIds requires table {:?} to have a single-column primary key", table.api_name),
                serde_json::json!({ "table": table.api_name, "primaryKey": table.primary_key }),
            );
            return;
        }
        let pk_col = &table.primary_key[0];
        let Some(column) = table.column(pk_col) else {
            return;
        };
        for (i, id) in by_ids.iter().enumerate() {
            if !scalar_matches_type(id, column.r#type.scalar) {
                self.push(
                    "INVALID_BY_IDS",
                    format!("byIds[{i}] does not match primary key column type"),
                    serde_json::json!({ "index": i, "value": id }),
                );
            }
        }
    }

    fn check_access(&mut self, def: &QueryDefinition, from_table: &'a Table) {
        let mut to_check: Vec<(&'a Table, String)> = Vec::new();

        let explicit_columns = def.columns.clone().unwrap_or_else(|| {
            from_table.columns.iter().map(|c| c.api_name.clone()).collect()
        });
        for col in explicit_columns {
            to_check.push((from_table, col));
        }
        for gb in def.group_by.clone().unwrap_or_default() {
            let table = match &gb.table {
                Some(name) => self.tables.get(name).copied().unwrap_or(from_table),
                None => from_table,
            };
            to_check.push((table, gb.column));
        }
        if let Some(by_ids) = &def.by_ids {
            if !by_ids.is_empty() {
                if let Some(pk) = from_table.primary_key.first() {
                    to_check.push((from_table, pk.clone()));
                }
            }
        }

        let tables: Vec<&'a Table> = self.tables.values().copied().collect();
        for table in tables {
            let access = effective_table_access(table, self.context, |id| self.snapshot.role(id).cloned());
            for (check_table, col) in &to_check {
                if check_table.id != table.id {
                    continue;
                }
                match access.column(col) {
                    Some(c) if c.allowed => {}
                    _ => {
                        self.entries.push(
                            Entry::new(
                                "ACCESS_DENIED",
                                format!("column {col:?} on table {:?} is not accessible", table.api_name),
                            )
                            .with_details(serde_json::json!({ "table": table.api_name, "column": col })),
                        );
                    }
                }
            }
        }
    }
}

fn scalar_matches_type(value: &Value, scalar: qg_metadata::ScalarType) -> bool {
    use qg_metadata::ScalarType;
    match scalar {
        ScalarType::Uuid | ScalarType::String | ScalarType::Date | ScalarType::Timestamp => value.is_string(),
        ScalarType::Int => value.is_i64() || value.is_u64(),
        ScalarType::Decimal => value.is_number(),
        ScalarType::Boolean => value.is_boolean(),
    }
}
