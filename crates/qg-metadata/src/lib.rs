pub mod catalog;
pub mod config_validate;
pub mod index;
pub mod names;

pub use catalog::{
    AllowedColumns, Cache, CacheEntry, Column, ColumnType, Database, Engine, ExecutionContext,
    ExecutionContextRoles, ExternalSync, Freshness, Lag, MaskingFn, MetadataConfig,
    RelationReference, RelationType, Relation, Role, RoleTableEntry, RoleTables, ScalarType, Table,
};
pub use config_validate::validate_config;
pub use index::Indexes;
pub use names::is_valid_api_name;
