pub mod filter;
pub mod operator;
pub mod query;

pub use filter::{ColumnCompareFilter, CountComparison, ExistsFilter, FilterEntry, FilterGroup, FilterLogic, ValueFilter};
pub use operator::Operator;
pub use query::{
    Aggregation, AggregationFn, AggregationTarget, ExecuteMode, Freshness, GroupBy, Join,
    JoinType, OrderBy, OrderDirection, QueryDefinition,
};
