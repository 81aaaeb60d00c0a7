use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The physical engine backing a [`Database`]. The engine determines the
/// SQL dialect used to query it; `iceberg` always routes through the
/// federated dialect regardless of any declared catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Postgres,
    Clickhouse,
    Iceberg,
}

/// A physical database participating in the logical schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Database {
    pub id: String,
    pub engine: Engine,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_catalog: Option<String>,
}

/// The logical, engine-independent type of a column. `array` marks the
/// `[]` form named in §3 (e.g. `string[]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Uuid,
    String,
    Int,
    Decimal,
    Boolean,
    Date,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnType {
    pub scalar: ScalarType,
    #[serde(default)]
    pub array: bool,
}

impl ColumnType {
    pub fn scalar(scalar: ScalarType) -> Self {
        ColumnType {
            scalar,
            array: false,
        }
    }

    pub fn array(scalar: ScalarType) -> Self {
        ColumnType {
            scalar,
            array: true,
        }
    }
}

/// A column-level masking function (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum MaskingFn {
    Email,
    Phone,
    Name,
    Uuid,
    Number,
    Date,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Column {
    pub api_name: String,
    pub physical_name: String,
    #[serde(rename = "type")]
    pub r#type: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masking_fn: Option<MaskingFn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RelationType {
    ManyToOne,
    OneToOne,
    OneToMany,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RelationReference {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Relation {
    pub column: String,
    pub references: RelationReference,
    #[serde(rename = "type")]
    pub r#type: RelationType,
}

/// A table in the logical schema. `physical_name` may be schema-qualified
/// with `.` (e.g. `public.orders`) and is never exposed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Table {
    pub id: String,
    pub api_name: String,
    pub database: String,
    pub physical_name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl Table {
    pub fn column(&self, api_name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.api_name == api_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CacheEntry {
    pub table_id: String,
    pub key_pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Cache {
    pub id: String,
    pub engine: String,
    pub entries: Vec<CacheEntry>,
}

/// Replication lag bucket, ordered `seconds < minutes < hours` so freshness
/// comparisons (§4.4) are plain `Ord` comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Lag {
    Seconds,
    Minutes,
    Hours,
}

/// `freshness` on a query definition; `realtime` is stricter than any lag
/// bucket and therefore disallows every replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Realtime,
    Seconds,
    Minutes,
    Hours,
}

impl Freshness {
    /// Whether a replica with the given worst-case lag satisfies this
    /// freshness requirement. `realtime` never allows a replica.
    pub fn allows(&self, lag: Lag) -> bool {
        match self {
            Freshness::Realtime => false,
            Freshness::Seconds => matches!(lag, Lag::Seconds),
            Freshness::Minutes => matches!(lag, Lag::Seconds | Lag::Minutes),
            Freshness::Hours => true,
        }
    }
}

impl Default for Freshness {
    fn default() -> Self {
        Freshness::Realtime
    }
}

/// A one-way replicated copy of `source_table` into `target_database`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ExternalSync {
    pub source_table: String,
    pub target_database: String,
    pub target_physical_name: String,
    pub method: String,
    pub estimated_lag: Lag,
}

/// Either the literal `"*"` wildcard or an explicit column list. Modelled
/// as a bare `String`-or-`Vec<String>` untagged union, the same way
/// [`RoleTables`] handles its own `"*"` marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AllowedColumns {
    All(String),
    List(Vec<String>),
}

impl AllowedColumns {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, AllowedColumns::All(marker) if marker == "*")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RoleTableEntry {
    pub table_id: String,
    pub allowed_columns: AllowedColumns,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked_columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RoleTables {
    All(String),
    List(Vec<RoleTableEntry>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    pub tables: RoleTables,
}

impl Role {
    /// Whether this role's `tables` field is the `"*"` wildcard.
    pub fn is_wildcard(&self) -> bool {
        matches!(&self.tables, RoleTables::All(marker) if marker == "*")
    }

    pub fn entry_for_table<'a>(&'a self, table_id: &str) -> Option<&'a RoleTableEntry> {
        match &self.tables {
            RoleTables::All(_) => None,
            RoleTables::List(entries) => entries.iter().find(|e| e.table_id == table_id),
        }
    }
}

/// The scopes present on a request: zero, one, or two of `user`/`service`,
/// each carrying zero-or-more role ids (§3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ExecutionContextRoles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ExecutionContext {
    #[serde(default)]
    pub roles: ExecutionContextRoles,
}

/// The catalogue half of a [`crate::Snapshot`]: every database, table,
/// cache, and sync known to the gateway. Roles are modelled separately
/// (they come from a distinct provider, §6) but travel with the catalogue
/// inside a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MetadataConfig {
    #[serde(default)]
    pub databases: Vec<Database>,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub caches: Vec<Cache>,
    #[serde(default)]
    pub syncs: Vec<ExternalSync>,
}
