//! C10 pipeline orchestration (§4.7): wires C6 validation, C7 planning,
//! C8 resolution, C9 dialect generation, and C11 execution/caching into a
//! single entry point per query.

mod cache;
mod error;
mod executor;
mod pipeline;
mod result;
pub mod testing;

pub use cache::CacheProvider;
pub use error::PipelineError;
pub use executor::Executor;
pub use pipeline::{HealthReport, Pipeline, TRINO_EXECUTOR_ID};
pub use result::{ColumnDescriptor, PhaseTiming, QueryMeta, QueryResult, Strategy};
