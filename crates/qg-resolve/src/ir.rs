use qg_metadata::ColumnType;
use qg_query::{AggregationFn, FilterLogic, JoinType, OrderDirection, Operator};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub physical_name: String,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub table_alias: String,
    pub physical_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub r#type: JoinType,
    pub table: TableRef,
    pub left_column: ColumnRef,
    pub right_column: ColumnRef,
}

/// The recursive WHERE/HAVING IR (§4.5, §9). Dialect generators match the
/// tag; no variant ever carries a raw SQL-string value.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereNode {
    Group {
        logic: FilterLogic,
        not: bool,
        nodes: Vec<WhereNode>,
    },
    Exists {
        subquery: Box<Subquery>,
        negated: bool,
    },
    Counted {
        subquery: Box<Subquery>,
        op: Operator,
        count_param_idx: usize,
    },
    ColumnCompare {
        l: ColumnRef,
        op: Operator,
        r: ColumnRef,
    },
    /// A whitelisted helper function applied to a column, e.g.
    /// `levenshteinLte`.
    Function {
        func: &'static str,
        col: ColumnRef,
        arg_idx: usize,
        op: Operator,
        cmp_idx: usize,
    },
    Between {
        col: ColumnRef,
        not: bool,
        from_idx: usize,
        to_idx: usize,
    },
    Array {
        col: ColumnRef,
        op: Operator,
        elem_type: ColumnType,
        arg_idx: Option<usize>,
    },
    Simple {
        col: ColumnRef,
        op: Operator,
        param_idx: Option<usize>,
        column_type: ColumnType,
    },
}

/// A correlated subquery produced by lowering an `exists`/count filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    pub alias: String,
    pub from: TableRef,
    pub correlation: ColumnRef,
    pub parent_correlation: ColumnRef,
    pub where_: Option<WhereNode>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HavingNode {
    Group {
        logic: FilterLogic,
        not: bool,
        nodes: Vec<HavingNode>,
    },
    Between {
        target: HavingTarget,
        not: bool,
        from_idx: usize,
        to_idx: usize,
    },
    Simple {
        target: HavingTarget,
        op: Operator,
        param_idx: Option<usize>,
    },
}

/// Postgres (and the other dialects) reject a SELECT-list alias inside
/// HAVING, so a having entry that names an aggregation alias must re-emit
/// the aggregate expression itself rather than the alias.
#[derive(Debug, Clone, PartialEq)]
pub enum HavingTarget {
    Aggregation(AggregationIr),
    Column(ColumnRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationIr {
    pub r#fn: AggregationFn,
    pub column: Option<ColumnRef>,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderTarget {
    Column(ColumnRef),
    Alias(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByIr {
    pub target: OrderTarget,
    pub direction: OrderDirection,
}

/// One selected column's round-trip shape: the physical reference used in
/// generated SQL and the logical apiName/masking metadata returned to the
/// client (§4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub column: ColumnRef,
    pub api_name: String,
    pub output_name: String,
    pub masked: bool,
    pub masking_fn: Option<qg_metadata::MaskingFn>,
    pub column_type: ColumnType,
}

/// Dialect-neutral SQL IR lowered from a validated, planned query (§4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParts {
    pub select: Vec<ColumnRef>,
    pub distinct: bool,
    pub from: TableRef,
    pub joins: Vec<JoinClause>,
    pub where_: Option<WhereNode>,
    pub group_by: Vec<ColumnRef>,
    pub having: Option<HavingNode>,
    pub aggregations: Vec<AggregationIr>,
    pub order_by: Vec<OrderByIr>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub count_mode: bool,
    pub params: Vec<Value>,
    pub column_mapping: Vec<ColumnMapping>,
}
