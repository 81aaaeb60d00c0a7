use qg_metadata::ScalarType;
use qg_query::{FilterLogic, Operator};
use qg_resolve::{AggregationIr, ColumnRef, HavingNode, HavingTarget, JoinClause, OrderByIr, OrderTarget, SqlParts, WhereNode};
use serde_json::Value;

use crate::escape::{escape_like_literal, quote_ident, whitelisted_aggregation_fn};
use crate::GeneratedSql;

const Q: char = '"';

fn ident(name: &str) -> String {
    quote_ident(Q, name)
}

fn col_sql(col: &ColumnRef) -> String {
    format!("{}.{}", ident(&col.table_alias), ident(&col.physical_name))
}

/// Postgres-family generator: `$N` positional placeholders, `"`-quoted
/// identifiers, `t_alias__col` select aliasing to preserve provenance
/// (§4.6).
pub fn generate(parts: &SqlParts) -> GeneratedSql {
    let mut params = parts.params.clone();
    let mut sql = String::new();

    sql.push_str("SELECT ");
    if parts.count_mode {
        sql.push_str("COUNT(*)");
    } else if parts.distinct {
        sql.push_str("DISTINCT ");
    }

    if !parts.count_mode {
        let mut items = Vec::new();
        for col in &parts.select {
            let mapping = parts.column_mapping.iter().find(|m| m.column == *col);
            let out_name = mapping.map(|m| m.output_name.as_str()).unwrap_or(col.physical_name.as_str());
            items.push(format!("{} AS {}", col_sql(col), ident(&format!("{}__{}", col.table_alias, out_name))));
        }
        for agg in &parts.aggregations {
            items.push(render_aggregation(agg));
        }
        if items.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&items.join(", "));
        }
    }

    sql.push_str(" FROM ");
    sql.push_str(&format!("{} AS {}", ident(&parts.from.physical_name), ident(&parts.from.alias)));

    for join in &parts.joins {
        sql.push_str(&render_join(join));
    }

    if let Some(where_) = &parts.where_ {
        sql.push_str(" WHERE ");
        sql.push_str(&render_where(where_, &mut params));
    }

    if !parts.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&parts.group_by.iter().map(col_sql).collect::<Vec<_>>().join(", "));
    }

    if let Some(having) = &parts.having {
        sql.push_str(" HAVING ");
        sql.push_str(&render_having(having, &mut params));
    }

    if !parts.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(
            &parts
                .order_by
                .iter()
                .map(render_order_by)
                .collect::<Vec<_>>()
                .join(", "),
        );
    }

    if let Some(limit) = parts.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = parts.offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }

    GeneratedSql { sql, params }
}

fn render_aggregation(agg: &AggregationIr) -> String {
    format!("{} AS {}", aggregation_expr_sql(agg), ident(&agg.alias))
}

fn aggregation_expr_sql(agg: &AggregationIr) -> String {
    let fn_name = whitelisted_aggregation_fn(agg_fn_name(agg)).unwrap_or("count");
    let arg = match &agg.column {
        Some(col) => col_sql(col),
        None => "*".to_string(),
    };
    format!("{}({})", fn_name.to_uppercase(), arg)
}

fn agg_fn_name(agg: &AggregationIr) -> &'static str {
    use qg_query::AggregationFn::*;
    match agg.r#fn {
        Count => "count",
        Sum => "sum",
        Avg => "avg",
        Min => "min",
        Max => "max",
    }
}

fn render_join(join: &JoinClause) -> String {
    let kind = match join.r#type {
        qg_query::JoinType::Inner => "JOIN",
        qg_query::JoinType::Left => "LEFT JOIN",
    };
    format!(
        " {} {} AS {} ON {} = {}",
        kind,
        ident(&join.table.physical_name),
        ident(&join.table.alias),
        col_sql(&join.left_column),
        col_sql(&join.right_column)
    )
}

fn placeholder(params: &mut Vec<Value>, idx: usize) -> String {
    let _ = &params;
    format!("${}", idx + 1)
}

fn render_where(node: &WhereNode, params: &mut Vec<Value>) -> String {
    match node {
        WhereNode::Group { logic, not, nodes } => {
            let joiner = match logic {
                FilterLogic::And => " AND ",
                FilterLogic::Or => " OR ",
            };
            let body = nodes.iter().map(|n| render_where(n, params)).collect::<Vec<_>>().join(joiner);
            if *not {
                format!("NOT ({body})")
            } else {
                format!("({body})")
            }
        }
        WhereNode::ColumnCompare { l, op, r } => format!("{} {} {}", col_sql(l), operator_sql(*op), col_sql(r)),
        WhereNode::Between { col, not, from_idx, to_idx } => {
            let kw = if *not { "NOT BETWEEN" } else { "BETWEEN" };
            format!("{} {} {} AND {}", col_sql(col), kw, placeholder(params, *from_idx), placeholder(params, *to_idx))
        }
        WhereNode::Function { func, col, arg_idx, cmp_idx, .. } => {
            let fn_name = if *func == "levenshtein" { "levenshtein" } else { *func };
            format!(
                "{}({}, {}) <= {}",
                fn_name,
                col_sql(col),
                placeholder(params, *arg_idx),
                placeholder(params, *cmp_idx)
            )
        }
        WhereNode::Array { col, op, arg_idx, elem_type } => render_array_op(col, *op, *arg_idx, elem_type.scalar, params),
        WhereNode::Simple { col, op, param_idx, .. } => render_simple_op(col, *op, *param_idx, params),
        WhereNode::Exists { subquery, negated } => {
            let prefix = if *negated { "NOT EXISTS" } else { "EXISTS" };
            let inner_where = subquery.where_.as_ref().map(|w| render_where(w, params));
            let correlation = format!(
                "{} = {}",
                format!("{}.{}", ident(&subquery.from.alias), ident(&subquery.correlation.physical_name)),
                col_sql(&subquery.parent_correlation)
            );
            let where_clause = match inner_where {
                Some(w) => format!("{correlation} AND {w}"),
                None => correlation,
            };
            format!(
                "{prefix} (SELECT 1 FROM {} AS {} WHERE {})",
                ident(&subquery.from.physical_name),
                ident(&subquery.from.alias),
                where_clause
            )
        }
        WhereNode::Counted { subquery, op, count_param_idx } => {
            let inner_where = subquery.where_.as_ref().map(|w| render_where(w, params));
            let correlation = format!(
                "{}.{} = {}",
                ident(&subquery.from.alias),
                ident(&subquery.correlation.physical_name),
                col_sql(&subquery.parent_correlation)
            );
            let where_clause = match inner_where {
                Some(w) => format!("{correlation} AND {w}"),
                None => correlation,
            };
            let limit_clause = subquery.limit.map(|l| format!(" LIMIT {l}")).unwrap_or_default();
            format!(
                "(SELECT COUNT(*) FROM {} AS {} WHERE {}{}) {} {}",
                ident(&subquery.from.physical_name),
                ident(&subquery.from.alias),
                where_clause,
                limit_clause,
                operator_sql(*op),
                placeholder(params, *count_param_idx)
            )
        }
    }
}

fn render_array_op(col: &ColumnRef, op: Operator, arg_idx: Option<usize>, elem_scalar: ScalarType, params: &mut Vec<Value>) -> String {
    let elem_ty = pg_scalar_type(elem_scalar);
    match op {
        Operator::ArrayIsEmpty => format!("cardinality({}) = 0", col_sql(col)),
        Operator::ArrayIsNotEmpty => format!("cardinality({}) > 0", col_sql(col)),
        Operator::ArrayContains => format!("{}::{elem_ty} = ANY({})", placeholder(params, arg_idx.unwrap_or_default()), col_sql(col)),
        Operator::ArrayContainsAll => format!("{} @> {}::{elem_ty}[]", col_sql(col), placeholder(params, arg_idx.unwrap_or_default())),
        Operator::ArrayContainsAny => format!("{} && {}::{elem_ty}[]", col_sql(col), placeholder(params, arg_idx.unwrap_or_default())),
        _ => unreachable!("non-array operator routed through render_array_op"),
    }
}

fn pg_scalar_type(scalar: ScalarType) -> &'static str {
    match scalar {
        ScalarType::Uuid => "uuid",
        ScalarType::String => "text",
        ScalarType::Int => "bigint",
        ScalarType::Decimal => "numeric",
        ScalarType::Boolean => "boolean",
        ScalarType::Date => "date",
        ScalarType::Timestamp => "timestamptz",
    }
}

fn render_simple_op(col: &ColumnRef, op: Operator, param_idx: Option<usize>, params: &mut Vec<Value>) -> String {
    let c = col_sql(col);
    match op {
        Operator::IsNull => format!("{c} IS NULL"),
        Operator::IsNotNull => format!("{c} IS NOT NULL"),
        Operator::In => format!("{c} = ANY({})", placeholder(params, param_idx.unwrap_or_default())),
        Operator::NotIn => format!("{c} <> ALL({})", placeholder(params, param_idx.unwrap_or_default())),
        Operator::Like => format!("{c} LIKE {}", placeholder(params, param_idx.unwrap_or_default())),
        Operator::NotLike => format!("{c} NOT LIKE {}", placeholder(params, param_idx.unwrap_or_default())),
        Operator::Ilike => format!("{c} ILIKE {}", placeholder(params, param_idx.unwrap_or_default())),
        Operator::NotIlike => format!("{c} NOT ILIKE {}", placeholder(params, param_idx.unwrap_or_default())),
        Operator::StartsWith | Operator::EndsWith | Operator::Contains | Operator::NotContains => {
            let negate = matches!(op, Operator::NotContains);
            let like = if negate { "NOT LIKE" } else { "LIKE" };
            escaped_pattern_param(params, param_idx, op);
            format!("{c} {like} {}", placeholder(params, param_idx.unwrap_or_default()))
        }
        Operator::IstartsWith | Operator::IendsWith | Operator::Icontains | Operator::NotIcontains => {
            let negate = matches!(op, Operator::NotIcontains);
            let like = if negate { "NOT ILIKE" } else { "ILIKE" };
            escaped_pattern_param(params, param_idx, op);
            format!("{c} {like} {}", placeholder(params, param_idx.unwrap_or_default()))
        }
        _ => format!("{c} {} {}", operator_sql(op), placeholder(params, param_idx.unwrap_or_default())),
    }
}

/// Rewrites the already-pushed pattern parameter in place to escape LIKE
/// metacharacters and wrap it with the wildcard shape the operator needs.
fn escaped_pattern_param(params: &mut [Value], param_idx: Option<usize>, op: Operator) {
    let Some(idx) = param_idx else { return };
    let Some(slot) = params.get_mut(idx) else { return };
    let Some(text) = slot.as_str() else { return };
    let escaped = escape_like_literal(text);
    let wrapped = match op {
        Operator::StartsWith | Operator::IstartsWith => format!("{escaped}%"),
        Operator::EndsWith | Operator::IendsWith => format!("%{escaped}"),
        _ => format!("%{escaped}%"),
    };
    *slot = Value::String(wrapped);
}

fn operator_sql(op: Operator) -> &'static str {
    match op {
        Operator::Eq => "=",
        Operator::Ne => "<>",
        Operator::Lt => "<",
        Operator::Lte => "<=",
        Operator::Gt => ">",
        Operator::Gte => ">=",
        _ => "=",
    }
}

fn render_having(node: &HavingNode, params: &mut Vec<Value>) -> String {
    match node {
        HavingNode::Group { logic, not, nodes } => {
            let joiner = match logic {
                FilterLogic::And => " AND ",
                FilterLogic::Or => " OR ",
            };
            let body = nodes.iter().map(|n| render_having(n, params)).collect::<Vec<_>>().join(joiner);
            if *not {
                format!("NOT ({body})")
            } else {
                format!("({body})")
            }
        }
        HavingNode::Between { target, not, from_idx, to_idx } => {
            let kw = if *not { "NOT BETWEEN" } else { "BETWEEN" };
            format!(
                "{} {} {} AND {}",
                having_target_sql(target),
                kw,
                placeholder(params, *from_idx),
                placeholder(params, *to_idx)
            )
        }
        HavingNode::Simple { target, op, param_idx } => match param_idx {
            Some(idx) => format!("{} {} {}", having_target_sql(target), operator_sql(*op), placeholder(params, *idx)),
            None => format!("{} {}", having_target_sql(target), if matches!(op, Operator::IsNull) { "IS NULL" } else { "IS NOT NULL" }),
        },
    }
}

fn having_target_sql(target: &HavingTarget) -> String {
    match target {
        HavingTarget::Aggregation(agg) => aggregation_expr_sql(agg),
        HavingTarget::Column(c) => col_sql(c),
    }
}

fn render_order_by(ob: &OrderByIr) -> String {
    let target = match &ob.target {
        OrderTarget::Alias(a) => ident(a),
        OrderTarget::Column(c) => col_sql(c),
    };
    let dir = match ob.direction {
        qg_query::OrderDirection::Asc => "ASC",
        qg_query::OrderDirection::Desc => "DESC",
    };
    format!("{target} {dir}")
}
