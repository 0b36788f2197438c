//! Declared-vs-live comparison and schema synchronization.
//!
//! [`diff_schema`] compares declared tables and views with what the catalog
//! returned, after giving the declared side the same shape the introspector
//! produces: unique columns materialized as constraints or indices, and
//! blank names filled by the naming strategy. [`QueryRunner::synchronize`]
//! then applies the difference in an order that never drops something
//! another object still depends on:
//!
//! 1. changed views are dropped
//! 2. stale foreign keys, then stale indices and constraints, are dropped
//! 3. removed columns are dropped, new ones added, changed ones altered
//! 4. new tables are created without their foreign keys
//! 5. missing indices and constraints, then foreign keys, are created
//! 6. missing views are created
//!
//! Tables that exist live but are not declared are left alone.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::config::DeclaredSchema;
use crate::context::SchemaContext;
use crate::dialect::plan::prepared;
use crate::dialect::{CreateTableOptions, DdlContext, DdlDialect};
use crate::error::Result;
use crate::reconcile::{ColumnChange, ObjectRef, TableRef};
use crate::runner::QueryRunner;
use crate::schema::{
    Table, TableCheck, TableColumn, TableExclusion, TableForeignKey, TableIndex, TableUnique, View,
};
use crate::statement::Changeset;

/// Differences between one declared table and its live counterpart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDiff {
    /// Live table name.
    pub name: String,
    /// Declared table, normalized.
    pub target: Table,
    /// Live foreign keys that are not declared or differ.
    pub dropped_foreign_keys: Vec<TableForeignKey>,
    /// Live indices that are not declared or differ.
    pub dropped_indices: Vec<TableIndex>,
    /// Live unique constraints that are not declared.
    pub dropped_uniques: Vec<TableUnique>,
    /// Live check constraints that are not declared.
    pub dropped_checks: Vec<TableCheck>,
    /// Live exclusion constraints that are not declared.
    pub dropped_exclusions: Vec<TableExclusion>,
    /// Live columns that are not declared.
    pub dropped_columns: Vec<TableColumn>,
    /// Declared columns that do not exist yet.
    pub added_columns: Vec<TableColumn>,
    /// Columns whose definition, key membership, uniqueness or comment differ.
    pub changed_columns: Vec<ColumnChange>,
    /// Declared indices to create.
    pub created_indices: Vec<TableIndex>,
    /// Declared unique constraints to create.
    pub created_uniques: Vec<TableUnique>,
    /// Declared check constraints to create.
    pub created_checks: Vec<TableCheck>,
    /// Declared exclusion constraints to create.
    pub created_exclusions: Vec<TableExclusion>,
    /// Declared foreign keys to create.
    pub created_foreign_keys: Vec<TableForeignKey>,
}

impl TableDiff {
    /// Returns true if the live table already matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dropped_foreign_keys.is_empty()
            && self.dropped_indices.is_empty()
            && self.dropped_uniques.is_empty()
            && self.dropped_checks.is_empty()
            && self.dropped_exclusions.is_empty()
            && self.dropped_columns.is_empty()
            && self.added_columns.is_empty()
            && self.changed_columns.is_empty()
            && self.created_indices.is_empty()
            && self.created_uniques.is_empty()
            && self.created_checks.is_empty()
            && self.created_exclusions.is_empty()
            && self.created_foreign_keys.is_empty()
    }
}

/// Differences between a declared schema and the live database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    /// Declared tables that do not exist, normalized.
    pub created_tables: Vec<Table>,
    /// Existing tables that need changes.
    pub altered_tables: Vec<TableDiff>,
    /// Live views whose definition changed.
    pub dropped_views: Vec<View>,
    /// Declared views that are missing or changed.
    pub created_views: Vec<View>,
}

impl SchemaDiff {
    /// Returns true if nothing needs to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created_tables.is_empty()
            && self.altered_tables.is_empty()
            && self.dropped_views.is_empty()
            && self.created_views.is_empty()
    }
}

fn same_index(a: &TableIndex, b: &TableIndex) -> bool {
    let columns = |i: &TableIndex| i.column_names.iter().cloned().collect::<BTreeSet<_>>();
    a.name == b.name
        && a.is_unique == b.is_unique
        && a.is_spatial == b.is_spatial
        && a.is_fulltext == b.is_fulltext
        && columns(a) == columns(b)
}

fn same_foreign_key<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &SchemaContext,
    a: &TableForeignKey,
    b: &TableForeignKey,
) -> bool {
    let referenced = |fk: &TableForeignKey| dialect.resolve_path(ctx, &fk.referenced_table_name);
    a.name == b.name
        && a.column_names == b.column_names
        && a.referenced_column_names == b.referenced_column_names
        && referenced(a) == referenced(b)
        && a.on_delete == b.on_delete
        && a.on_update == b.on_update
}

fn column_changed<D: DdlDialect + ?Sized>(dialect: &D, live: &TableColumn, declared: &TableColumn) -> bool {
    dialect.is_definition_changed(live, declared)
        || live.is_primary != declared.is_primary
        || live.is_unique != declared.is_unique
        || live.comment != declared.comment
        || live.enum_name != declared.enum_name
}

/// Columns that column operations will make unique on their own.
fn unique_by_column_ops(diff: &TableDiff) -> BTreeSet<String> {
    diff.added_columns
        .iter()
        .filter(|c| c.is_unique)
        .map(|c| c.name.clone())
        .chain(
            diff.changed_columns
                .iter()
                .filter(|c| c.to.is_unique && !c.from.is_unique)
                .map(|c| c.to.name.clone()),
        )
        .collect()
}

/// Structures `declared` has and `current` lacks: indices, unique, check
/// and exclusion constraints, and foreign keys.
fn missing_structures<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &SchemaContext,
    declared: &Table,
    current: &Table,
    diff: &mut TableDiff,
) {
    let ignored = &ctx.unsynchronized_indices;
    diff.created_indices = declared
        .indices
        .iter()
        .filter(|i| !ignored.contains(&i.name))
        .filter(|i| !current.indices.iter().any(|c| same_index(c, i)))
        .cloned()
        .collect();
    diff.created_uniques = declared
        .uniques
        .iter()
        .filter(|u| current.find_unique(&u.name).is_none())
        .cloned()
        .collect();
    diff.created_checks = declared
        .checks
        .iter()
        .filter(|c| current.find_check(&c.name).is_none())
        .cloned()
        .collect();
    diff.created_exclusions = declared
        .exclusions
        .iter()
        .filter(|x| current.find_exclusion(&x.name).is_none())
        .cloned()
        .collect();
    diff.created_foreign_keys = declared
        .foreign_keys
        .iter()
        .filter(|f| {
            !current
                .foreign_keys
                .iter()
                .any(|c| same_foreign_key(dialect, ctx, c, f))
        })
        .cloned()
        .collect();
}

/// Compares a declared table with its live counterpart.
#[must_use]
pub fn diff_table<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    declared: &Table,
    live: &Table,
) -> TableDiff {
    let declared = prepared(dialect, ctx, declared);
    let schema = ctx.schema;
    let ignored = &schema.unsynchronized_indices;

    let mut diff = TableDiff {
        name: live.name.clone(),
        ..TableDiff::default()
    };
    diff.dropped_foreign_keys = live
        .foreign_keys
        .iter()
        .filter(|l| {
            !declared
                .foreign_keys
                .iter()
                .any(|d| same_foreign_key(dialect, schema, l, d))
        })
        .cloned()
        .collect();
    diff.dropped_indices = live
        .indices
        .iter()
        .filter(|l| !ignored.contains(&l.name))
        .filter(|l| !declared.indices.iter().any(|d| same_index(l, d)))
        .cloned()
        .collect();
    diff.dropped_uniques = live
        .uniques
        .iter()
        .filter(|l| declared.find_unique(&l.name).is_none())
        .cloned()
        .collect();
    diff.dropped_checks = live
        .checks
        .iter()
        .filter(|l| declared.find_check(&l.name).is_none())
        .cloned()
        .collect();
    diff.dropped_exclusions = live
        .exclusions
        .iter()
        .filter(|l| declared.find_exclusion(&l.name).is_none())
        .cloned()
        .collect();

    diff.dropped_columns = live
        .columns
        .iter()
        .filter(|l| declared.find_column(&l.name).is_none())
        .cloned()
        .collect();
    for column in &declared.columns {
        match live.find_column(&column.name) {
            None => diff.added_columns.push(column.clone()),
            Some(current) if column_changed(dialect, current, column) => diff
                .changed_columns
                .push(ColumnChange::new(current.clone(), column.clone())),
            Some(_) => {}
        }
    }

    missing_structures(dialect, schema, &declared, live, &mut diff);
    let unique_columns = unique_by_column_ops(&diff);
    diff.created_uniques
        .retain(|u| !matches!(u.column_names.as_slice(), [c] if unique_columns.contains(c)));
    diff.created_indices.retain(|i| {
        !(i.is_unique && matches!(i.column_names.as_slice(), [c] if unique_columns.contains(c)))
    });

    diff.target = declared;
    diff
}

/// Compares declared tables and views with the live ones. Live objects
/// that are not declared are ignored.
#[must_use]
pub fn diff_schema<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    declared: &DeclaredSchema,
    live_tables: &[Table],
    live_views: &[View],
) -> SchemaDiff {
    let key = |name: &str| dialect.resolve_path(ctx.schema, name);
    let mut diff = SchemaDiff::default();

    for table in &declared.tables {
        match live_tables.iter().find(|l| key(&l.name) == key(&table.name)) {
            None => diff.created_tables.push(prepared(dialect, ctx, table)),
            Some(live) => {
                let table_diff = diff_table(dialect, ctx, table, live);
                if !table_diff.is_empty() {
                    diff.altered_tables.push(table_diff);
                }
            }
        }
    }

    for view in &declared.views {
        match live_views.iter().find(|l| key(&l.name) == key(&view.name)) {
            None => diff.created_views.push(view.clone()),
            Some(live)
                if live.expression != view.expression || live.materialized != view.materialized =>
            {
                diff.dropped_views.push(live.clone());
                diff.created_views.push(view.clone());
            }
            Some(_) => {}
        }
    }
    diff
}

impl QueryRunner {
    /// Loads the live counterparts of `declared` and compares them.
    pub async fn diff(&mut self, declared: &DeclaredSchema) -> Result<SchemaDiff> {
        let table_names: Vec<String> = declared.tables.iter().map(|t| t.name.clone()).collect();
        let view_names: Vec<String> = declared.views.iter().map(|v| v.name.clone()).collect();
        let live_tables = self.get_tables(&table_names).await?;
        let live_views = self.get_views(&view_names).await?;
        Ok(diff_schema(
            self.dialect.as_ref(),
            &self.ddl(),
            declared,
            &live_tables,
            &live_views,
        ))
    }

    /// Brings the database in line with `declared` and returns what was
    /// different.
    ///
    /// On dialects with transactional DDL the whole run is one transaction
    /// unless the caller already opened one. When a transactional run fails,
    /// the schema cache is restored to what it was before. Without
    /// transactional DDL every operation that succeeded stays applied, and
    /// so do their cache entries.
    pub async fn synchronize(&mut self, declared: &DeclaredSchema) -> Result<SchemaDiff> {
        let saved = self.cache.snapshot();
        let transactional = self.dialect.features().transactional_ddl
            && !self.is_sql_memory_enabled();
        let owns_transaction = transactional && !self.is_transaction_active();
        if owns_transaction {
            self.start_transaction(None).await?;
        }

        let outcome = self.apply_schema(declared).await;
        match outcome {
            Ok(diff) => {
                if owns_transaction {
                    self.commit_transaction().await?;
                }
                Ok(diff)
            }
            Err(err) => {
                if owns_transaction {
                    if let Err(rollback) = self.rollback_transaction().await {
                        warn!(error = %rollback, "Rollback failed");
                    }
                }
                if transactional {
                    self.cache.restore(&saved);
                }
                Err(err)
            }
        }
    }

    /// Computes the statements [`synchronize`](Self::synchronize) would run
    /// without running them. The schema cache is left as it was.
    pub async fn plan_synchronize(&mut self, declared: &DeclaredSchema) -> Result<Changeset> {
        let saved = self.cache.snapshot();
        self.enable_sql_memory();
        let outcome = self.apply_schema(declared).await;
        let changeset = self.take_sql_memory();
        self.disable_sql_memory();
        self.cache.restore(&saved);
        outcome.map(|_| changeset)
    }

    async fn apply_schema(&mut self, declared: &DeclaredSchema) -> Result<SchemaDiff> {
        let diff = self.diff(declared).await?;
        if diff.is_empty() {
            debug!("Schema is up to date");
            return Ok(diff);
        }
        info!(
            created_tables = diff.created_tables.len(),
            altered_tables = diff.altered_tables.len(),
            created_views = diff.created_views.len(),
            "Synchronizing schema"
        );

        for view in &diff.dropped_views {
            self.log_schema_build(&format!("dropping an old view: {}", view.name));
            self.drop_view(ObjectRef::ByName(view.name.clone())).await?;
        }

        for table in &diff.altered_tables {
            if !table.dropped_foreign_keys.is_empty() {
                self.log_schema_build(&format!(
                    "dropping old foreign keys of {}: {}",
                    table.name,
                    names(&table.dropped_foreign_keys, |f| &f.name)
                ));
                let keys = table
                    .dropped_foreign_keys
                    .iter()
                    .map(|f| ObjectRef::ByName(f.name.clone()))
                    .collect();
                self.drop_foreign_keys(table.name.as_str().into(), keys).await?;
            }
        }

        for table in &diff.altered_tables {
            self.drop_stale_structures(table).await?;
        }

        for table in &diff.altered_tables {
            if !table.dropped_columns.is_empty() {
                self.log_schema_build(&format!(
                    "columns dropped in {}: {}",
                    table.name,
                    names(&table.dropped_columns, |c| &c.name)
                ));
                let columns = table
                    .dropped_columns
                    .iter()
                    .map(|c| ObjectRef::ByName(c.name.clone()))
                    .collect();
                self.drop_columns(table.name.as_str().into(), columns).await?;
            }
        }

        for table in &diff.altered_tables {
            if !table.added_columns.is_empty() {
                self.log_schema_build(&format!(
                    "new columns added to {}: {}",
                    table.name,
                    names(&table.added_columns, |c| &c.name)
                ));
                self.add_columns(table.name.as_str().into(), table.added_columns.clone())
                    .await?;
            }
        }

        for table in &diff.altered_tables {
            if !table.changed_columns.is_empty() {
                self.log_schema_build(&format!(
                    "columns changed in {}: {}",
                    table.name,
                    names(&table.changed_columns, |c| &c.from.name)
                ));
                self.change_columns(table.name.as_str().into(), table.changed_columns.clone())
                    .await?;
            }
        }

        let no_foreign_keys = CreateTableOptions {
            foreign_keys: false,
            indices: true,
        };
        for table in &diff.created_tables {
            self.log_schema_build(&format!("creating a new table: {}", table.name));
            self.create_table(table.clone(), false, no_foreign_keys).await?;
        }

        let targets: Vec<Table> = diff
            .altered_tables
            .iter()
            .map(|t| t.target.clone())
            .chain(diff.created_tables.iter().cloned())
            .collect();
        let mut pending_keys = Vec::new();
        for target in &targets {
            let missing = self.missing_for(target).await?;
            self.create_missing_structures(&missing).await?;
            if !missing.created_foreign_keys.is_empty() {
                pending_keys.push(missing);
            }
        }
        for missing in pending_keys {
            self.log_schema_build(&format!(
                "creating foreign keys of {}: {}",
                missing.name,
                names(&missing.created_foreign_keys, |f| &f.name)
            ));
            self.create_foreign_keys(missing.name.as_str().into(), missing.created_foreign_keys)
                .await?;
        }

        for view in &diff.created_views {
            self.log_schema_build(&format!("creating a new view: {}", view.name));
            self.create_view(view.clone()).await?;
        }
        Ok(diff)
    }

    async fn drop_stale_structures(&mut self, table: &TableDiff) -> Result<()> {
        let target = || TableRef::from(table.name.as_str());
        if !table.dropped_indices.is_empty() {
            self.log_schema_build(&format!(
                "dropping old indices of {}: {}",
                table.name,
                names(&table.dropped_indices, |i| &i.name)
            ));
            let indices = table
                .dropped_indices
                .iter()
                .map(|i| ObjectRef::ByName(i.name.clone()))
                .collect();
            self.drop_indices(target(), indices).await?;
        }
        if !table.dropped_uniques.is_empty() {
            let uniques = table
                .dropped_uniques
                .iter()
                .map(|u| ObjectRef::ByName(u.name.clone()))
                .collect();
            self.drop_unique_constraints(target(), uniques).await?;
        }
        if !table.dropped_checks.is_empty() {
            let checks = table
                .dropped_checks
                .iter()
                .map(|c| ObjectRef::ByName(c.name.clone()))
                .collect();
            self.drop_check_constraints(target(), checks).await?;
        }
        if !table.dropped_exclusions.is_empty() {
            let exclusions = table
                .dropped_exclusions
                .iter()
                .map(|x| ObjectRef::ByName(x.name.clone()))
                .collect();
            self.drop_exclusion_constraints(target(), exclusions).await?;
        }
        Ok(())
    }

    /// Compares `target` with the table as it stands after the column steps.
    async fn missing_for(&mut self, target: &Table) -> Result<TableDiff> {
        let current = self.cached_table(&target.name).await?;
        let mut missing = TableDiff {
            name: current.name.clone(),
            ..TableDiff::default()
        };
        missing_structures(
            self.dialect.as_ref(),
            &self.context,
            target,
            &current,
            &mut missing,
        );
        Ok(missing)
    }

    async fn create_missing_structures(&mut self, missing: &TableDiff) -> Result<()> {
        let target = || TableRef::from(missing.name.as_str());
        if !missing.created_indices.is_empty() {
            self.log_schema_build(&format!(
                "creating new indices of {}: {}",
                missing.name,
                names(&missing.created_indices, |i| &i.name)
            ));
            self.create_indices(target(), missing.created_indices.clone())
                .await?;
        }
        if !missing.created_uniques.is_empty() {
            self.create_unique_constraints(target(), missing.created_uniques.clone())
                .await?;
        }
        if !missing.created_checks.is_empty() {
            self.create_check_constraints(target(), missing.created_checks.clone())
                .await?;
        }
        if !missing.created_exclusions.is_empty() {
            self.create_exclusion_constraints(target(), missing.created_exclusions.clone())
                .await?;
        }
        Ok(())
    }
}

fn names<T>(items: &[T], name: impl Fn(&T) -> &String) -> String {
    items
        .iter()
        .map(|item| name(item).as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::RunnerOptions;
    use crate::dialect::{MySqlDialect, PostgresDialect};
    use crate::error::SyncError;
    use crate::testing::{runner, ScriptedConnection};
    use crate::naming::{DefaultNamingStrategy, NamingStrategy};

    fn ctx_parts() -> (DefaultNamingStrategy, SchemaContext) {
        (
            DefaultNamingStrategy::new(),
            SchemaContext::with_schema("public"),
        )
    }

    fn live_user(naming: &DefaultNamingStrategy) -> Table {
        let unique = naming.unique_constraint_name("user", &["email".to_string()]);
        Table::new("user")
            .column(TableColumn::new("id", "integer").primary())
            .column(TableColumn::new("email", "character varying").length("255").unique())
            .column(TableColumn::new("legacy", "text").nullable())
            .unique(TableUnique::new(unique, ["email"]))
            .index(TableIndex::new("IDX_old", ["legacy"]))
    }

    #[test]
    fn test_identical_tables_have_no_diff() {
        let (naming, schema) = ctx_parts();
        let ctx = DdlContext {
            naming: &naming,
            schema: &schema,
        };
        let declared = Table::new("user")
            .column(TableColumn::new("id", "int4").primary())
            .column(TableColumn::new("email", "varchar").length("255").unique())
            .column(TableColumn::new("legacy", "text").nullable())
            .index(TableIndex::new("IDX_old", ["legacy"]));

        let diff = diff_table(&PostgresDialect::new(), &ctx, &declared, &live_user(&naming));
        assert!(diff.is_empty(), "{diff:?}");
    }

    #[test]
    fn test_column_and_index_changes() {
        let (naming, schema) = ctx_parts();
        let ctx = DdlContext {
            naming: &naming,
            schema: &schema,
        };
        let declared = Table::new("user")
            .column(TableColumn::new("id", "integer").primary())
            .column(TableColumn::new("email", "varchar").length("320").unique())
            .column(TableColumn::new("nickname", "varchar").length("64").unique())
            .index(TableIndex::new("IDX_email", ["email"]));

        let diff = diff_table(&PostgresDialect::new(), &ctx, &declared, &live_user(&naming));

        assert_eq!(diff.dropped_columns[0].name, "legacy");
        assert_eq!(diff.added_columns[0].name, "nickname");
        assert_eq!(diff.changed_columns.len(), 1);
        assert_eq!(diff.changed_columns[0].to.length.as_deref(), Some("320"));
        assert_eq!(diff.dropped_indices[0].name, "IDX_old");
        assert_eq!(diff.created_indices[0].name, "IDX_email");
        assert!(diff.created_uniques.is_empty());
    }

    #[test]
    fn test_unsynchronized_indices_are_ignored() {
        let (naming, mut schema) = ctx_parts();
        schema.unsynchronized_indices.insert("IDX_old".to_string());
        let ctx = DdlContext {
            naming: &naming,
            schema: &schema,
        };
        let declared = Table::new("user")
            .column(TableColumn::new("id", "integer").primary())
            .column(TableColumn::new("email", "varchar").length("255").unique())
            .column(TableColumn::new("legacy", "text").nullable())
            .index(TableIndex::new("IDX_manual", ["legacy"]));
        let mut live = live_user(&naming);
        live.indices.clear();
        live.indices.push(TableIndex::new("IDX_old", ["legacy"]));

        let diff = diff_table(&PostgresDialect::new(), &ctx, &declared, &live);
        assert!(diff.dropped_indices.is_empty());
        assert_eq!(diff.created_indices.len(), 1);
    }

    #[test]
    fn test_foreign_keys_compare_structure() {
        let (naming, schema) = ctx_parts();
        let ctx = DdlContext {
            naming: &naming,
            schema: &schema,
        };
        let live = Table::new("post")
            .column(TableColumn::new("id", "integer").primary())
            .column(TableColumn::new("author_id", "integer"))
            .foreign_key(TableForeignKey::new("FK_author", ["author_id"], "user", ["id"]));
        let declared = live.clone();
        let mut changed = live.clone();
        changed.foreign_keys[0].referenced_table_name = "public.user".to_string();

        let dialect = PostgresDialect::new();
        assert!(diff_table(&dialect, &ctx, &declared, &live).is_empty());
        assert!(diff_table(&dialect, &ctx, &changed, &live).is_empty());

        changed.foreign_keys[0].referenced_table_name = "member".to_string();
        let diff = diff_table(&dialect, &ctx, &changed, &live);
        assert_eq!(diff.dropped_foreign_keys.len(), 1);
        assert_eq!(diff.created_foreign_keys[0].referenced_table_name, "member");
    }

    #[test]
    fn test_mysql_unique_column_filter() {
        let naming = DefaultNamingStrategy::new();
        let schema = SchemaContext::with_database("app");
        let ctx = DdlContext {
            naming: &naming,
            schema: &schema,
        };
        let live = Table::new("user").column(TableColumn::new("id", "int").primary());
        let declared = live
            .clone()
            .column(TableColumn::new("email", "varchar").length("255").unique());

        let diff = diff_table(&MySqlDialect::new(), &ctx, &declared, &live);
        assert_eq!(diff.added_columns.len(), 1);
        assert!(diff.created_indices.is_empty());
        assert_eq!(diff.target.indices.len(), 1);
        assert!(diff.target.indices[0].is_unique);
    }

    #[test]
    fn test_schema_diff_views() {
        let (naming, schema) = ctx_parts();
        let ctx = DdlContext {
            naming: &naming,
            schema: &schema,
        };
        let declared = DeclaredSchema {
            tables: vec![Table::new("tag").column(TableColumn::new("id", "integer").primary())],
            views: vec![
                View::new("kept", "SELECT 1"),
                View::new("changed", "SELECT 2"),
                View::new("new", "SELECT 3"),
            ],
        };
        let live_views = vec![
            View::new("kept", "SELECT 1"),
            View::new("changed", "SELECT 20"),
            View::new("unknown", "SELECT 4"),
        ];

        let diff = diff_schema(&PostgresDialect::new(), &ctx, &declared, &[], &live_views);
        assert_eq!(diff.created_tables.len(), 1);
        assert_eq!(diff.dropped_views, vec![View::new("changed", "SELECT 20")]);
        let created: Vec<&str> = diff.created_views.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(created, vec!["changed", "new"]);
    }

    fn tag_catalog() -> ScriptedConnection {
        let naming = DefaultNamingStrategy::new();
        let primary = naming.primary_key_name("tag", &["id".to_string()]);
        ScriptedConnection::new()
            .respond(
                "FROM information_schema.tables",
                json!([{"table_schema": "public", "table_name": "tag"}]),
            )
            .respond(
                "FROM information_schema.columns",
                json!([
                    {"table_schema": "public", "table_name": "tag", "column_name": "id",
                     "data_type": "integer", "udt_schema": "pg_catalog", "udt_name": "int4",
                     "is_nullable": "NO", "column_default": null,
                     "is_identity": "NO", "is_generated": "NEVER"},
                    {"table_schema": "public", "table_name": "tag", "column_name": "label",
                     "data_type": "character varying", "udt_schema": "pg_catalog",
                     "udt_name": "varchar", "is_nullable": "YES", "column_default": null,
                     "character_maximum_length": 64, "is_identity": "NO", "is_generated": "NEVER"}
                ]),
            )
            .respond(
                "FROM pg_constraint cnst",
                json!([
                    {"table_schema": "public", "table_name": "tag", "constraint_name": primary,
                     "constraint_type": "p", "expression": "PRIMARY KEY (id)", "column_name": "id"}
                ]),
            )
    }

    fn declared_tags() -> DeclaredSchema {
        DeclaredSchema {
            tables: vec![
                Table::new("tag")
                    .column(TableColumn::new("id", "integer").primary())
                    .column(TableColumn::new("label", "varchar").length("64").nullable())
                    .column(TableColumn::new("slug", "varchar").length("64").unique()),
                Table::new("tag_link")
                    .column(TableColumn::new("id", "integer").primary())
                    .column(TableColumn::new("tag_id", "integer"))
                    .foreign_key(TableForeignKey::new("", ["tag_id"], "tag", ["id"])),
            ],
            views: Vec::new(),
        }
    }

    fn postgres_runner(conn: &Arc<ScriptedConnection>) -> QueryRunner {
        runner(conn, PostgresDialect::new(), RunnerOptions::new().with_schema("public"))
    }

    #[tokio::test]
    async fn test_synchronize_orders_statements() {
        let conn = Arc::new(tag_catalog());
        let mut runner = postgres_runner(&conn);

        let diff = runner.synchronize(&declared_tags()).await.unwrap();
        assert_eq!(diff.created_tables.len(), 1);
        assert_eq!(diff.altered_tables[0].added_columns[0].name, "slug");

        let statements = conn.statements();
        let position = |needle: &str| {
            statements
                .iter()
                .position(|sql| sql.contains(needle))
                .unwrap_or_else(|| panic!("missing {needle}: {statements:?}"))
        };
        let add = position("ADD \"slug\"");
        let unique = position("UNIQUE (\"slug\")");
        let create = position("CREATE TABLE \"tag_link\"");
        let foreign_key = position("FOREIGN KEY (\"tag_id\")");
        assert!(add < unique && unique < create && create < foreign_key);
        assert_eq!(
            statements.iter().filter(|sql| sql.contains("UNIQUE")).count(),
            1
        );

        let executed = conn.executed();
        assert!(executed.iter().any(|sql| sql.starts_with("START TRANSACTION")));
        assert_eq!(executed.last().map(String::as_str), Some("COMMIT"));
        assert!(runner.schema_cache().table("tag_link").is_some());
    }

    #[tokio::test]
    async fn test_synchronize_twice_is_quiet() {
        let conn = Arc::new(tag_catalog());
        let mut runner = postgres_runner(&conn);
        let declared = DeclaredSchema {
            tables: vec![Table::new("tag")
                .column(TableColumn::new("id", "int4").primary())
                .column(TableColumn::new("label", "character varying").length("64").nullable())],
            views: Vec::new(),
        };

        let diff = runner.synchronize(&declared).await.unwrap();
        assert!(diff.is_empty(), "{diff:?}");
        assert!(conn.statements().is_empty());
    }

    #[tokio::test]
    async fn test_failed_synchronize_rolls_back_and_restores_cache() {
        let conn = Arc::new(tag_catalog().fail_on("CREATE TABLE \"tag_link\""));
        let mut runner = postgres_runner(&conn);
        let before = runner.schema_cache().generation();

        let err = runner.synchronize(&declared_tags()).await.unwrap_err();
        assert!(matches!(err, SyncError::QueryFailed { .. }));
        assert_eq!(conn.executed().last().map(String::as_str), Some("ROLLBACK"));
        assert!(!runner.is_transaction_active());
        assert!(runner.schema_cache().table("tag").is_none());
        assert!(runner.schema_cache().generation() > before);
    }

    #[tokio::test]
    async fn test_plan_synchronize_runs_nothing() {
        let conn = Arc::new(tag_catalog());
        let mut runner = postgres_runner(&conn);

        let plan = runner.plan_synchronize(&declared_tags()).await.unwrap();

        assert!(conn.statements().is_empty());
        assert!(!runner.is_sql_memory_enabled());
        assert!(runner.schema_cache().table("tag_link").is_none());
        assert!(plan.up_sql().contains("CREATE TABLE \"tag_link\""));
        assert!(plan.down_sql().contains("DROP TABLE \"tag_link\""));
        assert_eq!(plan.up.len(), plan.down.len());
    }
}
