use std::collections::{HashMap, HashSet};

use qg_access::effective_table_access;
use qg_metadata::{ColumnType, ExecutionContext, Table};
use qg_query::{
    Aggregation, ColumnCompareFilter, CountComparison, ExecuteMode, ExistsFilter, FilterEntry,
    FilterGroup, Join, Operator, OrderBy, QueryDefinition, ValueFilter,
};
use qg_registry::Snapshot;
use serde_json::Value;

use crate::ir::{
    AggregationIr, ColumnMapping, ColumnRef, HavingNode, HavingTarget, JoinClause, OrderByIr,
    OrderTarget, SqlParts, Subquery, TableRef, WhereNode,
};

/// Lowers a validated [`QueryDefinition`] into [`SqlParts`] (§4.5).
/// Assumes the query already passed `qg_validate::validate_query` —
/// resolution does not re-check access or shape, only translates.
pub fn resolve(def: &QueryDefinition, snapshot: &Snapshot, context: &ExecutionContext) -> SqlParts {
    let from_table = snapshot
        .table_by_api_name(&def.from)
        .expect("resolve called on an already-validated query");

    let mut r = Resolver {
        snapshot,
        context,
        table_aliases: HashMap::new(),
        table_alias_counter: 0,
        subquery_alias_counter: 0,
        params: Vec::new(),
    };

    let from_alias = r.alloc_table_alias(&def.from);
    let from_ref = TableRef {
        physical_name: from_table.physical_name.clone(),
        alias: from_alias,
    };

    let count_mode = def.execute_mode == ExecuteMode::Count;

    let mut joins = Vec::new();
    let mut join_tables: Vec<&Table> = Vec::new();
    if let Some(def_joins) = &def.joins {
        for j in def_joins {
            if let Some((clause, table)) = r.lower_join(from_table, j) {
                joins.push(clause);
                join_tables.push(table);
            }
        }
    }

    let mut where_nodes = Vec::new();
    if let Some(by_ids) = &def.by_ids {
        if !by_ids.is_empty() {
            let pk = from_table.primary_key[0].clone();
            let col = from_table.column(&pk).expect("validated byIds column exists");
            let from_alias = r.table_aliases.get(&def.from).unwrap().clone();
            let idx = r.push_param(Value::Array(by_ids.clone()));
            where_nodes.push(WhereNode::Simple {
                col: ColumnRef {
                    table_alias: from_alias,
                    physical_name: col.physical_name.clone(),
                },
                op: Operator::In,
                param_idx: Some(idx),
                column_type: col.r#type,
            });
        }
    }
    if let Some(filters) = &def.filters {
        for f in filters {
            where_nodes.push(r.lower_filter_entry(from_table, f));
        }
    }
    let where_ = combine_and(where_nodes);

    let mut group_by: Vec<ColumnRef> = Vec::new();
    let mut group_by_map: HashMap<String, ColumnRef> = HashMap::new();
    if !count_mode {
        for gb in def.group_by.clone().unwrap_or_default() {
            let col_ref = r.column_ref_qualified(from_table, &gb.table, &gb.column);
            group_by_map.insert(gb.column.clone(), col_ref.clone());
            group_by.push(col_ref);
        }
    }

    let aggregations: Vec<AggregationIr> = if count_mode {
        Vec::new()
    } else {
        def.aggregations
            .clone()
            .unwrap_or_default()
            .iter()
            .map(|a| r.lower_aggregation(from_table, a))
            .collect()
    };
    let agg_map: HashMap<String, AggregationIr> = aggregations.iter().map(|a| (a.alias.clone(), a.clone())).collect();

    let having = if count_mode {
        None
    } else {
        def.having
            .as_ref()
            .map(|entries| {
                combine_having_and(entries.iter().map(|e| r.lower_having_entry(e, &agg_map, &group_by_map)).collect())
            })
            .flatten()
    };

    let order_by: Vec<OrderByIr> = if count_mode {
        Vec::new()
    } else {
        def.order_by
            .clone()
            .unwrap_or_default()
            .iter()
            .map(|o| r.lower_order_by(o, from_table, &agg_map))
            .collect()
    };

    let agg_aliases: HashSet<String> = agg_map.keys().cloned().collect();
    let column_mapping = r.build_column_mapping(def, from_table, &join_tables, &agg_aliases, count_mode);
    let select: Vec<ColumnRef> = column_mapping.iter().map(|m| m.column.clone()).collect();

    SqlParts {
        select,
        distinct: !count_mode && def.distinct,
        from: from_ref,
        joins,
        where_,
        group_by,
        having,
        aggregations,
        order_by,
        limit: if count_mode { None } else { def.limit },
        offset: if count_mode { None } else { def.offset },
        count_mode,
        params: r.params,
        column_mapping,
    }
}

struct Resolver<'a> {
    snapshot: &'a Snapshot,
    context: &'a ExecutionContext,
    table_aliases: HashMap<String, String>,
    table_alias_counter: usize,
    subquery_alias_counter: usize,
    params: Vec<Value>,
}

impl<'a> Resolver<'a> {
    fn alloc_table_alias(&mut self, table_api_name: &str) -> String {
        if let Some(existing) = self.table_aliases.get(table_api_name) {
            return existing.clone();
        }
        let alias = format!("t{}", self.table_alias_counter);
        self.table_alias_counter += 1;
        self.table_aliases.insert(table_api_name.to_string(), alias.clone());
        alias
    }

    fn alloc_subquery_alias(&mut self) -> String {
        let alias = format!("s{}", self.subquery_alias_counter);
        self.subquery_alias_counter += 1;
        alias
    }

    fn push_param(&mut self, value: Value) -> usize {
        self.params.push(value);
        self.params.len() - 1
    }

    fn resolve_table(&mut self, api_name: &str) -> &'a Table {
        self.alloc_table_alias(api_name);
        self.snapshot
            .table_by_api_name(api_name)
            .expect("resolve called on an already-validated query")
    }

    fn column_ref(&mut self, table: &Table, col: &str) -> ColumnRef {
        let alias = self.alloc_table_alias(&table.api_name);
        let physical = table
            .column(col)
            .map(|c| c.physical_name.clone())
            .unwrap_or_else(|| col.to_string());
        ColumnRef {
            table_alias: alias,
            physical_name: physical,
        }
    }

    fn column_ref_qualified(&mut self, default_table: &'a Table, table: &Option<String>, col: &str) -> ColumnRef {
        let table = match table {
            Some(name) => self.resolve_table(name),
            None => default_table,
        };
        self.column_ref(table, col)
    }

    fn lower_join(&mut self, from_table: &'a Table, join: &Join) -> Option<(JoinClause, &'a Table)> {
        let target = self.resolve_table(&join.table);
        let (left_col, right_col) = from_table
            .relations
            .iter()
            .find(|r| r.references.table == target.api_name)
            .map(|r| (r.column.clone(), r.references.column.clone()))
            .or_else(|| {
                target
                    .relations
                    .iter()
                    .find(|r| r.references.table == from_table.api_name)
                    .map(|r| (r.references.column.clone(), r.column.clone()))
            })?;

        let left = self.column_ref(from_table, &left_col);
        let right = self.column_ref(target, &right_col);
        let target_alias = self.alloc_table_alias(&target.api_name);

        Some((
            JoinClause {
                r#type: join.r#type,
                table: TableRef {
                    physical_name: target.physical_name.clone(),
                    alias: target_alias,
                },
                left_column: left,
                right_column: right,
            },
            target,
        ))
    }

    fn lower_filter_entry(&mut self, default_table: &'a Table, entry: &FilterEntry) -> WhereNode {
        match entry {
            FilterEntry::Group(g) => self.lower_group(default_table, g),
            FilterEntry::Exists(e) => self.lower_exists(default_table, e),
            FilterEntry::ColumnCompare(c) => self.lower_column_compare(default_table, c),
            FilterEntry::Value(v) => self.lower_value_filter(default_table, v),
        }
    }

    fn lower_group(&mut self, default_table: &'a Table, g: &FilterGroup) -> WhereNode {
        WhereNode::Group {
            logic: g.logic,
            not: g.not,
            nodes: g.conditions.iter().map(|c| self.lower_filter_entry(default_table, c)).collect(),
        }
    }

    fn lower_column_compare(&mut self, default_table: &'a Table, c: &ColumnCompareFilter) -> WhereNode {
        let l = self.column_ref_qualified(default_table, &c.table, &c.column);
        let r = self.column_ref_qualified(default_table, &c.ref_table, &c.ref_column);
        WhereNode::ColumnCompare { l, op: c.operator, r }
    }

    fn lower_value_filter(&mut self, default_table: &'a Table, f: &ValueFilter) -> WhereNode {
        let table = match &f.table {
            Some(name) => self.resolve_table(name),
            None => default_table,
        };
        let col_meta = table.column(&f.column);
        let col = self.column_ref(table, &f.column);
        let column_type = col_meta.map(|c| c.r#type).unwrap_or(ColumnType::scalar(qg_metadata::ScalarType::String));

        if f.operator.is_nullary() {
            return WhereNode::Simple {
                col,
                op: f.operator,
                param_idx: None,
                column_type,
            };
        }

        let value = f.value.clone().unwrap_or(Value::Null);

        if f.operator.requires_between_value() {
            let from = value.get("from").cloned().unwrap_or(Value::Null);
            let to = value.get("to").cloned().unwrap_or(Value::Null);
            let from_idx = self.push_param(from);
            let to_idx = self.push_param(to);
            return WhereNode::Between {
                col,
                not: f.operator == Operator::NotBetween,
                from_idx,
                to_idx,
            };
        }

        if f.operator.requires_levenshtein_value() {
            let text = value.get("text").cloned().unwrap_or(Value::Null);
            let max_distance = value.get("maxDistance").cloned().unwrap_or(Value::Null);
            let arg_idx = self.push_param(text);
            let cmp_idx = self.push_param(max_distance);
            return WhereNode::Function {
                func: "levenshtein",
                col,
                arg_idx,
                op: Operator::LevenshteinLte,
                cmp_idx,
            };
        }

        if f.operator.requires_array_column() {
            let elem_type = column_type;
            let arg_idx = if matches!(value, Value::Null) {
                None
            } else {
                Some(self.push_param(value))
            };
            return WhereNode::Array {
                col,
                op: f.operator,
                elem_type,
                arg_idx,
            };
        }

        let param_idx = self.push_param(value);
        WhereNode::Simple {
            col,
            op: f.operator,
            param_idx: Some(param_idx),
            column_type,
        }
    }

    fn lower_exists(&mut self, default_table: &'a Table, e: &ExistsFilter) -> WhereNode {
        let child = self.resolve_table(&e.table);
        let (parent_col, child_col) = default_table
            .relations
            .iter()
            .find(|r| r.references.table == child.api_name)
            .map(|r| (r.column.clone(), r.references.column.clone()))
            .or_else(|| {
                child
                    .relations
                    .iter()
                    .find(|r| r.references.table == default_table.api_name)
                    .map(|r| (r.references.column.clone(), r.column.clone()))
            })
            .unwrap_or_else(|| (default_table.primary_key.first().cloned().unwrap_or_default(), child.primary_key.first().cloned().unwrap_or_default()));

        let alias = self.alloc_subquery_alias();
        let parent_correlation = self.column_ref(default_table, &parent_col);
        let correlation = ColumnRef {
            table_alias: alias.clone(),
            physical_name: child.column(&child_col).map(|c| c.physical_name.clone()).unwrap_or(child_col),
        };

        let inner_where = e.filters.as_ref().map(|filters| {
            let nodes: Vec<WhereNode> = filters.iter().map(|f| self.lower_filter_entry(child, f)).collect();
            combine_and(nodes).expect("non-empty filters always lower to a node")
        });

        if let Some(count) = &e.count {
            let (limit, count_param_idx) = self.lower_count_comparison(count);
            let subquery = Subquery {
                alias,
                from: TableRef {
                    physical_name: child.physical_name.clone(),
                    alias: format!("{}_inner", child.api_name),
                },
                correlation,
                parent_correlation,
                where_: inner_where,
                limit,
            };
            return WhereNode::Counted {
                subquery: Box::new(subquery),
                op: count.operator,
                count_param_idx,
            };
        }

        let subquery = Subquery {
            alias,
            from: TableRef {
                physical_name: child.physical_name.clone(),
                alias: format!("{}_inner", child.api_name),
            },
            correlation,
            parent_correlation,
            where_: inner_where,
            limit: None,
        };
        WhereNode::Exists {
            subquery: Box::new(subquery),
            negated: e.exists == Some(false),
        }
    }

    /// §4.5: `count` on an exists filter either becomes a plain count
    /// subquery or, when the operator is `>=`/`>` over a non-negative
    /// integer, a LIMIT-shortcut equivalent.
    fn lower_count_comparison(&mut self, count: &CountComparison) -> (Option<i64>, usize) {
        if matches!(count.operator, Operator::Gte | Operator::Gt) {
            if let Some(n) = count.value.as_i64() {
                if n >= 0 {
                    let limit = if count.operator == Operator::Gte { n } else { n + 1 };
                    let idx = self.push_param(count.value.clone());
                    return (Some(limit), idx);
                }
            }
        }
        let idx = self.push_param(count.value.clone());
        (None, idx)
    }

    fn lower_aggregation(&mut self, default_table: &'a Table, agg: &Aggregation) -> AggregationIr {
        let column = agg.column.column_name().map(|name| self.column_ref_qualified(default_table, &agg.table, name));
        AggregationIr {
            r#fn: agg.r#fn,
            column,
            alias: agg.alias.clone(),
        }
    }

    /// §4.5/§8: a having entry's `column` must resolve to either the
    /// aggregation it names (rendered as the aggregate expression, since
    /// SELECT aliases aren't valid inside HAVING) or a groupBy column
    /// (rendered as a physical column reference). The validator already
    /// guarantees one of the two matches.
    fn lower_having_entry(
        &mut self,
        entry: &FilterEntry,
        agg_map: &HashMap<String, AggregationIr>,
        group_by_map: &HashMap<String, ColumnRef>,
    ) -> HavingNode {
        match entry {
            FilterEntry::Group(g) => HavingNode::Group {
                logic: g.logic,
                not: g.not,
                nodes: g.conditions.iter().map(|c| self.lower_having_entry(c, agg_map, group_by_map)).collect(),
            },
            FilterEntry::Value(v) => {
                let target = if let Some(agg) = agg_map.get(&v.column) {
                    HavingTarget::Aggregation(agg.clone())
                } else if let Some(col) = group_by_map.get(&v.column) {
                    HavingTarget::Column(col.clone())
                } else {
                    HavingTarget::Column(ColumnRef { table_alias: String::new(), physical_name: v.column.clone() })
                };
                if v.operator.requires_between_value() {
                    let value = v.value.clone().unwrap_or(Value::Null);
                    let from_idx = self.push_param(value.get("from").cloned().unwrap_or(Value::Null));
                    let to_idx = self.push_param(value.get("to").cloned().unwrap_or(Value::Null));
                    HavingNode::Between {
                        target,
                        not: v.operator == Operator::NotBetween,
                        from_idx,
                        to_idx,
                    }
                } else {
                    let param_idx = v.value.clone().map(|val| self.push_param(val));
                    HavingNode::Simple {
                        target,
                        op: v.operator,
                        param_idx,
                    }
                }
            }
            _ => HavingNode::Simple {
                target: HavingTarget::Column(ColumnRef { table_alias: String::new(), physical_name: String::new() }),
                op: Operator::IsNull,
                param_idx: None,
            },
        }
    }

    /// §4.5: an orderBy equal to an aggregation alias stays an alias
    /// reference (valid in ORDER BY, unlike HAVING); anything else — a
    /// selected or groupBy column — resolves to its physical column.
    fn lower_order_by(&mut self, ob: &OrderBy, from_table: &'a Table, agg_map: &HashMap<String, AggregationIr>) -> OrderByIr {
        let target = if agg_map.contains_key(&ob.column) {
            OrderTarget::Alias(ob.column.clone())
        } else {
            OrderTarget::Column(self.column_ref(from_table, &ob.column))
        };
        OrderByIr { target, direction: ob.direction }
    }

    /// §4.5 select-list resolution choices plus join-column collision
    /// qualification.
    fn build_column_mapping(
        &mut self,
        def: &QueryDefinition,
        from_table: &'a Table,
        join_tables: &[&'a Table],
        agg_aliases: &HashSet<String>,
        count_mode: bool,
    ) -> Vec<ColumnMapping> {
        if count_mode {
            return Vec::new();
        }

        let has_aggregations = def.aggregations.as_ref().map(|a| !a.is_empty()).unwrap_or(false);

        let mut from_columns: Vec<String> = match (&def.columns, has_aggregations) {
            (Some(cols), _) if !cols.is_empty() => cols.clone(),
            (Some(_), true) => Vec::new(),
            (None, true) => def.group_by.clone().unwrap_or_default().into_iter().map(|gb| gb.column).collect(),
            (None, false) => from_table.columns.iter().map(|c| c.api_name.clone()).collect(),
            (Some(_), false) => Vec::new(),
        };
        from_columns.dedup();

        let access = effective_table_access(from_table, self.context, |id| self.snapshot.role(id).cloned());
        let from_alias = self.alloc_table_alias(&from_table.api_name);

        let mut mappings = Vec::new();
        let mut seen_names: HashMap<String, usize> = HashMap::new();
        for name in &from_columns {
            *seen_names.entry(name.clone()).or_insert(0) += 1;
        }

        for name in &from_columns {
            if let Some(col) = from_table.column(name) {
                let access_col = access.column(name);
                mappings.push(ColumnMapping {
                    column: ColumnRef {
                        table_alias: from_alias.clone(),
                        physical_name: col.physical_name.clone(),
                    },
                    api_name: name.clone(),
                    output_name: name.clone(),
                    masked: access_col.map(|c| c.masked).unwrap_or(false),
                    masking_fn: access_col.and_then(|c| c.masking_fn),
                    column_type: col.r#type,
                });
            }
        }

        if !has_aggregations {
            for join_table in join_tables {
                let join_alias = self.alloc_table_alias(&join_table.api_name);
                let join_access = effective_table_access(join_table, self.context, |id| self.snapshot.role(id).cloned());
                for col in &join_table.columns {
                    let access_col = join_access.column(&col.api_name);
                    if access_col.map(|c| !c.allowed).unwrap_or(true) {
                        continue;
                    }
                    let collides = seen_names.contains_key(&col.api_name);
                    if collides {
                        for m in mappings.iter_mut().filter(|m| m.api_name == col.api_name) {
                            m.output_name = format!("{}.{}", from_table.api_name, m.api_name);
                        }
                    }
                    let output_name = if collides {
                        format!("{}.{}", join_table.api_name, col.api_name)
                    } else {
                        col.api_name.clone()
                    };
                    *seen_names.entry(col.api_name.clone()).or_insert(0) += 1;
                    mappings.push(ColumnMapping {
                        column: ColumnRef {
                            table_alias: join_alias.clone(),
                            physical_name: col.physical_name.clone(),
                        },
                        api_name: col.api_name.clone(),
                        output_name,
                        masked: access_col.map(|c| c.masked).unwrap_or(false),
                        masking_fn: access_col.and_then(|c| c.masking_fn),
                        column_type: col.r#type,
                    });
                }
            }
        }

        mappings
    }
}

fn combine_and(nodes: Vec<WhereNode>) -> Option<WhereNode> {
    if nodes.is_empty() {
        None
    } else if nodes.len() == 1 {
        nodes.into_iter().next()
    } else {
        Some(WhereNode::Group {
            logic: qg_query::FilterLogic::And,
            not: false,
            nodes,
        })
    }
}

fn combine_having_and(nodes: Vec<HavingNode>) -> Option<HavingNode> {
    if nodes.is_empty() {
        None
    } else if nodes.len() == 1 {
        nodes.into_iter().next()
    } else {
        Some(HavingNode::Group {
            logic: qg_query::FilterLogic::And,
            not: false,
            nodes,
        })
    }
}
