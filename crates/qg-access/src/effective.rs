use std::collections::{HashMap, HashSet};

use qg_metadata::{AllowedColumns, ExecutionContext, MaskingFn, Role, Table};

/// Per-column access outcome for one table under one [`ExecutionContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAccess {
    pub allowed: bool,
    pub masked: bool,
    pub masking_fn: Option<MaskingFn>,
}

/// Resolution result for one `(table, context)` pair (§4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveTableAccess {
    pub allowed: bool,
    pub columns: HashMap<String, ColumnAccess>,
}

impl EffectiveTableAccess {
    pub fn column(&self, api_name: &str) -> Option<&ColumnAccess> {
        self.columns.get(api_name)
    }
}

/// One scope's (user or service) resolved view of a table, before
/// intersecting with any other present scope.
struct ScopeAccess {
    allowed: bool,
    allowed_columns: HashSet<String>,
    unmasked_columns: HashSet<String>,
}

fn resolve_scope(table: &Table, role_ids: &[String], roles: &[&Role]) -> ScopeAccess {
    if role_ids.is_empty() {
        return ScopeAccess {
            allowed: false,
            allowed_columns: HashSet::new(),
            unmasked_columns: HashSet::new(),
        };
    }

    let mut allowed = false;
    let mut allowed_columns = HashSet::new();
    let mut unmasked_columns = HashSet::new();

    for role in roles {
        if role.is_wildcard() {
            allowed = true;
            for col in &table.columns {
                allowed_columns.insert(col.api_name.clone());
                unmasked_columns.insert(col.api_name.clone());
            }
            continue;
        }
        let Some(entry) = role.entry_for_table(&table.id) else {
            continue;
        };
        allowed = true;

        let role_allowed: HashSet<String> = match &entry.allowed_columns {
            AllowedColumns::All(_) => table.columns.iter().map(|c| c.api_name.clone()).collect(),
            AllowedColumns::List(cols) => cols.iter().cloned().collect(),
        };

        let masked: HashSet<&str> = entry
            .masked_columns
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(|s| s.as_str())
            .collect();

        for col in &role_allowed {
            allowed_columns.insert(col.clone());
            if !masked.contains(col.as_str()) {
                unmasked_columns.insert(col.clone());
            }
        }
    }

    ScopeAccess {
        allowed,
        allowed_columns,
        unmasked_columns,
    }
}

/// Computes [`EffectiveTableAccess`] for a table under a context (§4.2).
/// With no scopes present, access is unrestricted. Otherwise each present
/// scope is resolved independently and the results intersected: a column
/// is allowed only if every scope allows it, and masked if allowed and
/// masked in at least one scope.
pub fn effective_table_access(
    table: &Table,
    context: &ExecutionContext,
    role_lookup: impl Fn(&str) -> Option<Role>,
) -> EffectiveTableAccess {
    let scopes: Vec<&Option<Vec<String>>> = vec![&context.roles.user, &context.roles.service];
    let present: Vec<&Vec<String>> = scopes.into_iter().flatten().collect();

    if present.is_empty() {
        let columns = table
            .columns
            .iter()
            .map(|c| {
                (
                    c.api_name.clone(),
                    ColumnAccess {
                        allowed: true,
                        masked: false,
                        masking_fn: None,
                    },
                )
            })
            .collect();
        return EffectiveTableAccess {
            allowed: true,
            columns,
        };
    }

    let mut scope_results = Vec::with_capacity(present.len());
    for role_ids in present {
        let roles: Vec<Role> = role_ids.iter().filter_map(&role_lookup).collect();
        let role_refs: Vec<&Role> = roles.iter().collect();
        scope_results.push(resolve_scope(table, role_ids, &role_refs));
    }

    let table_allowed = scope_results.iter().all(|s| s.allowed);

    let mut columns = HashMap::new();
    for col in &table.columns {
        let allowed = table_allowed
            && scope_results
                .iter()
                .all(|s| s.allowed_columns.contains(&col.api_name));
        let masked = allowed
            && scope_results
                .iter()
                .any(|s| s.allowed_columns.contains(&col.api_name) && !s.unmasked_columns.contains(&col.api_name));
        let masking_fn = if masked {
            Some(col.masking_fn.unwrap_or(MaskingFn::Full))
        } else {
            None
        };
        columns.insert(
            col.api_name.clone(),
            ColumnAccess {
                allowed,
                masked,
                masking_fn,
            },
        );
    }

    EffectiveTableAccess {
        allowed: table_allowed,
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qg_metadata::{Column, ColumnType, ExecutionContextRoles, RoleTableEntry, RoleTables, ScalarType};

    fn sample_table() -> Table {
        Table {
            id: "t1".into(),
            api_name: "customers".into(),
            database: "db1".into(),
            physical_name: "public.customers".into(),
            columns: vec![
                Column {
                    api_name: "id".into(),
                    physical_name: "id".into(),
                    r#type: ColumnType::scalar(ScalarType::Uuid),
                    nullable: false,
                    masking_fn: None,
                },
                Column {
                    api_name: "email".into(),
                    physical_name: "email".into(),
                    r#type: ColumnType::scalar(ScalarType::String),
                    nullable: false,
                    masking_fn: Some(MaskingFn::Email),
                },
            ],
            primary_key: vec!["id".into()],
            relations: vec![],
        }
    }

    #[test]
    fn no_scopes_is_unrestricted() {
        let table = sample_table();
        let ctx = ExecutionContext::default();
        let access = effective_table_access(&table, &ctx, |_| None);
        assert!(access.allowed);
        assert!(!access.column("email").unwrap().masked);
    }

    #[test]
    fn empty_role_list_denies_scope() {
        let table = sample_table();
        let ctx = ExecutionContext {
            roles: ExecutionContextRoles {
                user: Some(vec![]),
                service: None,
            },
        };
        let access = effective_table_access(&table, &ctx, |_| None);
        assert!(!access.allowed);
    }

    #[test]
    fn intersection_is_most_restrictive_on_masking() {
        let table = sample_table();
        let unmasking_role = Role {
            id: "r1".into(),
            tables: RoleTables::List(vec![RoleTableEntry {
                table_id: "t1".into(),
                allowed_columns: AllowedColumns::All("*".into()),
                masked_columns: None,
            }]),
        };
        let masking_role = Role {
            id: "r2".into(),
            tables: RoleTables::List(vec![RoleTableEntry {
                table_id: "t1".into(),
                allowed_columns: AllowedColumns::All("*".into()),
                masked_columns: Some(vec!["email".into()]),
            }]),
        };
        let ctx = ExecutionContext {
            roles: ExecutionContextRoles {
                user: Some(vec!["r1".into()]),
                service: Some(vec!["r2".into()]),
            },
        };
        let roles = [unmasking_role, masking_role];
        let access = effective_table_access(&table, &ctx, |id| {
            roles.iter().find(|r| r.id == id).cloned()
        });
        assert!(access.column("email").unwrap().masked);
        assert_eq!(access.column("email").unwrap().masking_fn, Some(MaskingFn::Email));
    }

    #[test]
    fn union_within_scope_lets_any_role_unmask() {
        let table = sample_table();
        let masking_role = Role {
            id: "r1".into(),
            tables: RoleTables::List(vec![RoleTableEntry {
                table_id: "t1".into(),
                allowed_columns: AllowedColumns::All("*".into()),
                masked_columns: Some(vec!["email".into()]),
            }]),
        };
        let unmasking_role = Role {
            id: "r2".into(),
            tables: RoleTables::List(vec![RoleTableEntry {
                table_id: "t1".into(),
                allowed_columns: AllowedColumns::All("*".into()),
                masked_columns: None,
            }]),
        };
        let ctx = ExecutionContext {
            roles: ExecutionContextRoles {
                user: Some(vec!["r1".into(), "r2".into()]),
                service: None,
            },
        };
        let roles = [masking_role, unmasking_role];
        let access = effective_table_access(&table, &ctx, |id| {
            roles.iter().find(|r| r.id == id).cloned()
        });
        assert!(!access.column("email").unwrap().masked);
    }
}
