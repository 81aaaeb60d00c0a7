pub mod ir;
pub mod resolve;

pub use ir::{
    AggregationIr, ColumnMapping, ColumnRef, HavingNode, HavingTarget, JoinClause, OrderByIr,
    OrderTarget, SqlParts, Subquery, TableRef, WhereNode,
};
pub use resolve::resolve;
