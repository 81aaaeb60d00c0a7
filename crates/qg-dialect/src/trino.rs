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

/// Federated (Trino) generator: `?` positional placeholders bound in
/// emission order, `"`-quoted identifiers, `t_alias__col` select aliasing
/// to preserve provenance across catalogs (§4.6). `in`/`notIn` expand an
/// array-valued parameter into one `?` per element, since Trino's JDBC
/// driver has no array-bind shortcut for `IN`.
pub fn generate(parts: &SqlParts) -> GeneratedSql {
    let source = &parts.params;
    let mut sql = String::new();
    let mut out = Vec::new();

    sql.push_str("SELECT ");
    if parts.count_mode {
        sql.push_str("COUNT(*)");
    } else {
        if parts.distinct {
            sql.push_str("DISTINCT ");
        }
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
        sql.push_str(&render_where(where_, source, &mut out));
    }

    if !parts.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&parts.group_by.iter().map(col_sql).collect::<Vec<_>>().join(", "));
    }

    if let Some(having) = &parts.having {
        sql.push_str(" HAVING ");
        sql.push_str(&render_having(having, source, &mut out));
    }

    if !parts.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&parts.order_by.iter().map(render_order_by).collect::<Vec<_>>().join(", "));
    }

    if let Some(limit) = parts.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = parts.offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }

    GeneratedSql { sql, params: out }
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

/// Binds a single source parameter as one `?`, appending its value to the
/// output vector in emission order.
fn placeholder(source: &[Value], out: &mut Vec<Value>, idx: usize) -> String {
    out.push(source.get(idx).cloned().unwrap_or(Value::Null));
    "?".to_string()
}

/// Binds a LIKE-family pattern parameter, escaping and wildcard-wrapping
/// it first.
fn like_placeholder(source: &[Value], out: &mut Vec<Value>, idx: usize, op: Operator) -> String {
    let text = source.get(idx).and_then(|v| v.as_str()).unwrap_or_default();
    let escaped = escape_like_literal(text);
    let wrapped = match op {
        Operator::StartsWith | Operator::IstartsWith => format!("{escaped}%"),
        Operator::EndsWith | Operator::IendsWith => format!("%{escaped}"),
        _ => format!("%{escaped}%"),
    };
    out.push(Value::String(wrapped));
    "?".to_string()
}

/// Expands an array-valued source parameter into `(?, ?, ...)`.
fn expand_list(source: &[Value], out: &mut Vec<Value>, idx: usize) -> String {
    let elements = source.get(idx).and_then(|v| v.as_array()).cloned().unwrap_or_default();
    if elements.is_empty() {
        return "(NULL)".to_string();
    }
    let placeholders = elements
        .into_iter()
        .map(|v| {
            out.push(v);
            "?"
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("({placeholders})")
}

fn render_where(node: &WhereNode, source: &[Value], out: &mut Vec<Value>) -> String {
    match node {
        WhereNode::Group { logic, not, nodes } => {
            let joiner = match logic {
                FilterLogic::And => " AND ",
                FilterLogic::Or => " OR ",
            };
            let body = nodes.iter().map(|n| render_where(n, source, out)).collect::<Vec<_>>().join(joiner);
            if *not {
                format!("NOT ({body})")
            } else {
                format!("({body})")
            }
        }
        WhereNode::ColumnCompare { l, op, r } => format!("{} {} {}", col_sql(l), operator_sql(*op), col_sql(r)),
        WhereNode::Between { col, not, from_idx, to_idx } => {
            let kw = if *not { "NOT BETWEEN" } else { "BETWEEN" };
            format!(
                "{} {} {} AND {}",
                col_sql(col),
                kw,
                placeholder(source, out, *from_idx),
                placeholder(source, out, *to_idx)
            )
        }
        WhereNode::Function { col, arg_idx, cmp_idx, .. } => {
            format!(
                "levenshtein_distance({}, {}) <= {}",
                col_sql(col),
                placeholder(source, out, *arg_idx),
                placeholder(source, out, *cmp_idx)
            )
        }
        WhereNode::Array { col, op, arg_idx, .. } => render_array_op(col, *op, *arg_idx, source, out),
        WhereNode::Simple { col, op, param_idx, .. } => render_simple_op(col, *op, *param_idx, source, out),
        WhereNode::Exists { subquery, negated } => {
            let prefix = if *negated { "NOT EXISTS" } else { "EXISTS" };
            let correlation = format!(
                "{}.{} = {}",
                ident(&subquery.from.alias),
                ident(&subquery.correlation.physical_name),
                col_sql(&subquery.parent_correlation)
            );
            let inner_where = subquery.where_.as_ref().map(|w| render_where(w, source, out));
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
            let correlation = format!(
                "{}.{} = {}",
                ident(&subquery.from.alias),
                ident(&subquery.correlation.physical_name),
                col_sql(&subquery.parent_correlation)
            );
            let inner_where = subquery.where_.as_ref().map(|w| render_where(w, source, out));
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
                placeholder(source, out, *count_param_idx)
            )
        }
    }
}

fn render_array_op(col: &ColumnRef, op: Operator, arg_idx: Option<usize>, source: &[Value], out: &mut Vec<Value>) -> String {
    match op {
        Operator::ArrayIsEmpty => format!("cardinality({}) = 0", col_sql(col)),
        Operator::ArrayIsNotEmpty => format!("cardinality({}) > 0", col_sql(col)),
        Operator::ArrayContains => format!("contains({}, {})", col_sql(col), placeholder(source, out, arg_idx.unwrap_or_default())),
        Operator::ArrayContainsAll => {
            format!(
                "cardinality(array_except({}, {})) = 0",
                placeholder(source, out, arg_idx.unwrap_or_default()),
                col_sql(col)
            )
        }
        Operator::ArrayContainsAny => {
            format!("arrays_overlap({}, {})", col_sql(col), placeholder(source, out, arg_idx.unwrap_or_default()))
        }
        _ => unreachable!("non-array operator routed through render_array_op"),
    }
}

fn render_simple_op(col: &ColumnRef, op: Operator, param_idx: Option<usize>, source: &[Value], out: &mut Vec<Value>) -> String {
    let c = col_sql(col);
    match op {
        Operator::IsNull => format!("{c} IS NULL"),
        Operator::IsNotNull => format!("{c} IS NOT NULL"),
        Operator::In => format!("{c} IN {}", expand_list(source, out, param_idx.unwrap_or_default())),
        Operator::NotIn => format!("{c} NOT IN {}", expand_list(source, out, param_idx.unwrap_or_default())),
        Operator::Like => format!("{c} LIKE {}", placeholder(source, out, param_idx.unwrap_or_default())),
        Operator::NotLike => format!("{c} NOT LIKE {}", placeholder(source, out, param_idx.unwrap_or_default())),
        Operator::Ilike => format!("lower({c}) LIKE lower({})", placeholder(source, out, param_idx.unwrap_or_default())),
        Operator::NotIlike => format!("lower({c}) NOT LIKE lower({})", placeholder(source, out, param_idx.unwrap_or_default())),
        Operator::StartsWith | Operator::EndsWith | Operator::Contains | Operator::NotContains => {
            let negate = matches!(op, Operator::NotContains);
            let like = if negate { "NOT LIKE" } else { "LIKE" };
            format!("{c} {like} {} ESCAPE '\\'", like_placeholder(source, out, param_idx.unwrap_or_default(), op))
        }
        Operator::IstartsWith | Operator::IendsWith | Operator::Icontains | Operator::NotIcontains => {
            let negate = matches!(op, Operator::NotIcontains);
            let like = if negate { "NOT LIKE" } else { "LIKE" };
            format!(
                "lower({c}) {like} lower({}) ESCAPE '\\'",
                like_placeholder(source, out, param_idx.unwrap_or_default(), op)
            )
        }
        _ => format!("{c} {} {}", operator_sql(op), placeholder(source, out, param_idx.unwrap_or_default())),
    }
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

fn render_having(node: &HavingNode, source: &[Value], out: &mut Vec<Value>) -> String {
    match node {
        HavingNode::Group { logic, not, nodes } => {
            let joiner = match logic {
                FilterLogic::And => " AND ",
                FilterLogic::Or => " OR ",
            };
            let body = nodes.iter().map(|n| render_having(n, source, out)).collect::<Vec<_>>().join(joiner);
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
                placeholder(source, out, *from_idx),
                placeholder(source, out, *to_idx)
            )
        }
        HavingNode::Simple { target, op, param_idx } => match param_idx {
            Some(idx) => format!("{} {} {}", having_target_sql(target), operator_sql(*op), placeholder(source, out, *idx)),
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
