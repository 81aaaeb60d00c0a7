use qg_metadata::{ColumnType, ScalarType};
use qg_query::{FilterLogic, Operator};
use qg_resolve::{AggregationIr, ColumnRef, HavingNode, HavingTarget, JoinClause, OrderByIr, OrderTarget, SqlParts, WhereNode};
use serde_json::Value;

use crate::escape::{quote_ident, whitelisted_aggregation_fn};
use crate::GeneratedSql;

const Q: char = '`';

fn ident(name: &str) -> String {
    quote_ident(Q, name)
}

fn col_sql(col: &ColumnRef) -> String {
    format!("{}.{}", ident(&col.table_alias), ident(&col.physical_name))
}

fn ch_type(scalar: ScalarType, array: bool) -> &'static str {
    let base = match scalar {
        ScalarType::Uuid => "UUID",
        ScalarType::String => "String",
        ScalarType::Int => "Int64",
        ScalarType::Decimal => "Float64",
        ScalarType::Boolean => "UInt8",
        ScalarType::Date => "Date",
        ScalarType::Timestamp => "DateTime",
    };
    if array {
        match base {
            "UUID" => "Array(UUID)",
            "String" => "Array(String)",
            "Int64" => "Array(Int64)",
            "Float64" => "Array(Float64)",
            "UInt8" => "Array(UInt8)",
            "Date" => "Array(Date)",
            _ => "Array(DateTime)",
        }
    } else {
        base
    }
}

/// ClickHouse generator: `{pN:Type}` typed named placeholders,
/// backtick-quoted identifiers, bare physical column names in the select
/// list (no `t_alias__col` provenance aliasing, §4.6).
pub fn generate(parts: &SqlParts) -> GeneratedSql {
    let mut params = parts.params.clone();
    let mut sql = String::new();

    sql.push_str("SELECT ");
    if parts.count_mode {
        sql.push_str("count()");
    } else {
        if parts.distinct {
            sql.push_str("DISTINCT ");
        }
        let mut items = Vec::new();
        for col in &parts.select {
            items.push(format!("{} AS {}", col_sql(col), ident(&col.physical_name)));
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
        sql.push_str(&parts.order_by.iter().map(render_order_by).collect::<Vec<_>>().join(", "));
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
    format!("{}({})", fn_name, arg)
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
        qg_query::JoinType::Inner => "INNER JOIN",
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

fn placeholder(params: &[Value], idx: usize) -> String {
    let ty = params
        .get(idx)
        .map(|v| match v {
            Value::Number(n) if n.is_i64() || n.is_u64() => "Int64",
            Value::Number(_) => "Float64",
            Value::Bool(_) => "UInt8",
            Value::Array(_) => "Array(String)",
            _ => "String",
        })
        .unwrap_or("String");
    format!("{{p{idx}:{ty}}}")
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
        WhereNode::Between { col, not, from_idx, to_idx, .. } => {
            let kw = if *not { "NOT BETWEEN" } else { "BETWEEN" };
            format!("{} {} {} AND {}", col_sql(col), kw, placeholder(params, *from_idx), placeholder(params, *to_idx))
        }
        WhereNode::Function { col, arg_idx, cmp_idx, .. } => {
            format!("editDistance({}, {}) <= {}", col_sql(col), placeholder(params, *arg_idx), placeholder(params, *cmp_idx))
        }
        WhereNode::Array { col, op, arg_idx, elem_type } => render_array_op(col, *op, *arg_idx, elem_type.scalar),
        WhereNode::Simple { col, op, param_idx, column_type } => render_simple_op(col, *op, *param_idx, *column_type, params),
        WhereNode::Exists { subquery, negated } => {
            let prefix = if *negated { "NOT EXISTS" } else { "EXISTS" };
            let correlation = format!(
                "{}.{} = {}",
                ident(&subquery.from.alias),
                ident(&subquery.correlation.physical_name),
                col_sql(&subquery.parent_correlation)
            );
            let inner_where = subquery.where_.as_ref().map(|w| render_where(w, params));
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
            let inner_where = subquery.where_.as_ref().map(|w| render_where(w, params));
            let where_clause = match inner_where {
                Some(w) => format!("{correlation} AND {w}"),
                None => correlation,
            };
            let limit_clause = subquery.limit.map(|l| format!(" LIMIT {l}")).unwrap_or_default();
            format!(
                "(SELECT count() FROM {} AS {} WHERE {}{}) {} {}",
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

fn render_array_op(col: &ColumnRef, op: Operator, arg_idx: Option<usize>, elem_scalar: ScalarType) -> String {
    let idx = arg_idx.unwrap_or_default();
    match op {
        Operator::ArrayIsEmpty => format!("empty({})", col_sql(col)),
        Operator::ArrayIsNotEmpty => format!("notEmpty({})", col_sql(col)),
        Operator::ArrayContains => format!("has({}, {{p{idx}:{}}})", col_sql(col), ch_type(elem_scalar, false)),
        Operator::ArrayContainsAll => format!("hasAll({}, {{p{idx}:{}}})", col_sql(col), ch_type(elem_scalar, true)),
        Operator::ArrayContainsAny => format!("hasAny({}, {{p{idx}:{}}})", col_sql(col), ch_type(elem_scalar, true)),
        _ => unreachable!("non-array operator routed through render_array_op"),
    }
}

fn render_simple_op(col: &ColumnRef, op: Operator, param_idx: Option<usize>, column_type: ColumnType, params: &mut Vec<Value>) -> String {
    let c = col_sql(col);
    let idx = param_idx.unwrap_or_default();
    match op {
        Operator::IsNull => format!("isNull({c})"),
        Operator::IsNotNull => format!("isNotNull({c})"),
        Operator::In => format!("{c} IN {{p{idx}:{}}}", ch_type(column_type.scalar, true)),
        Operator::NotIn => format!("{c} NOT IN {{p{idx}:{}}}", ch_type(column_type.scalar, true)),
        Operator::Like => format!("{c} LIKE {}", placeholder(params, idx)),
        Operator::NotLike => format!("{c} NOT LIKE {}", placeholder(params, idx)),
        Operator::Ilike => format!("ilike({c}, {})", placeholder(params, idx)),
        Operator::NotIlike => format!("NOT ilike({c}, {})", placeholder(params, idx)),
        Operator::StartsWith => format!("startsWith({c}, {})", placeholder(params, idx)),
        Operator::EndsWith => format!("endsWith({c}, {})", placeholder(params, idx)),
        Operator::IstartsWith => format!("startsWith(lower({c}), lower({}))", placeholder(params, idx)),
        Operator::IendsWith => format!("endsWith(lower({c}), lower({}))", placeholder(params, idx)),
        Operator::Contains => format!("position({c}, {}) > 0", placeholder(params, idx)),
        Operator::NotContains => format!("position({c}, {}) = 0", placeholder(params, idx)),
        Operator::Icontains => format!("position(lower({c}), lower({})) > 0", placeholder(params, idx)),
        Operator::NotIcontains => format!("position(lower({c}), lower({})) = 0", placeholder(params, idx)),
        _ => format!("{c} {} {{p{idx}:{}}}", operator_sql(op), ch_type(column_type.scalar, false)),
    }
}

fn operator_sql(op: Operator) -> &'static str {
    match op {
        Operator::Eq => "=",
        Operator::Ne => "!=",
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
            format!("{} {} {} AND {}", having_target_sql(target), kw, placeholder(params, *from_idx), placeholder(params, *to_idx))
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
